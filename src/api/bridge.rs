//! Contract between hosted page script and the host.
//!
//! The page may call three operations on the bridge object. The host
//! injects two scripts: an idempotent installer with a click interceptor
//! for `blob:` anchors, and a one-shot retrieval routine that reads a blob
//! and sends it back as base64.

use serde::{Deserialize, Serialize};

use crate::domain::DownloadError;
use crate::utils::{escape_js_string, is_blob_url};

/// Inbound calls from page script. Everything in here is untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeCall {
    RequestBlobDownload {
        blob_url: String,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        mime_type: Option<String>,
    },
    SaveBase64 {
        base64_data: String,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        mime_type: Option<String>,
    },
    /// `fileName` is the name the retrieval script was given, when known.
    ReportError {
        #[serde(default)]
        message: String,
        #[serde(default)]
        file_name: Option<String>,
    },
}

impl BridgeCall {
    pub fn parse(raw: &str) -> Result<Self, DownloadError> {
        let call: BridgeCall = serde_json::from_str(raw)
            .map_err(|e| DownloadError::BridgeProtocol(format!("Malformed call: {}", e)))?;
        call.validate()?;
        Ok(call)
    }

    /// Rejects calls no honest page script would make.
    pub fn validate(&self) -> Result<(), DownloadError> {
        match self {
            BridgeCall::RequestBlobDownload { blob_url, .. } if !is_blob_url(blob_url) => Err(
                DownloadError::BridgeProtocol(format!("Not a blob reference: {}", blob_url)),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageBridge {
    object: String,
}

impl PageBridge {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
        }
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    fn install_flag(&self) -> String {
        format!("__{}_installed", self.object)
    }

    /// Click interceptor for `blob:` anchors. Running it twice installs one listener.
    pub fn install_script(&self) -> String {
        let flag = self.install_flag();
        let bridge = format!("window['{}']", escape_js_string(&self.object));
        format!(
            "(function(){{\
             if(window['{flag}']){{return;}}\
             window['{flag}']=true;\
             document.addEventListener('click',function(e){{\
             var el=e.target;\
             while(el&&el.tagName!=='A'){{el=el.parentElement;}}\
             if(!el){{return;}}\
             var href=el.getAttribute('href');\
             if(href&&href.indexOf('blob:')===0){{\
             e.preventDefault();\
             var name=el.getAttribute('download')||'download';\
             var type=el.getAttribute('type')||'';\
             {bridge}.requestBlobDownload(href,name,type);\
             }}\
             }},true);\
             }})();",
            flag = escape_js_string(&flag),
            bridge = bridge,
        )
    }

    /// Fetches `url` inside the page and hands the bytes back through `saveBase64`.
    pub fn retrieval_script(&self, url: &str, file_name: &str, mime_type: Option<&str>) -> String {
        let bridge = format!("window['{}']", escape_js_string(&self.object));
        format!(
            "(function(){{\
             var url='{url}';\
             var fileName='{name}';\
             var mimeType='{mime}';\
             fetch(url).then(function(r){{return r.blob();}}).then(function(blob){{\
             var reader=new FileReader();\
             reader.onloadend=function(){{\
             var data=reader.result||'';\
             var base64=String(data).split(',')[1]||'';\
             {bridge}.saveBase64(base64,fileName,mimeType||(blob&&blob.type?blob.type:''));\
             }};\
             reader.onerror=function(){{{bridge}.reportError('read_error',fileName);}};\
             reader.readAsDataURL(blob);\
             }}).catch(function(err){{\
             {bridge}.reportError('fetch_error:'+(err&&err.message?err.message:err),fileName);\
             }});\
             }})();",
            url = escape_js_string(url),
            name = escape_js_string(file_name),
            mime = escape_js_string(mime_type.unwrap_or_default()),
            bridge = bridge,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_blob_download() {
        let call = BridgeCall::parse(
            r#"{"op":"requestBlobDownload","blobUrl":"blob:https://x/1","fileName":"data","mimeType":"text/csv"}"#,
        )
        .unwrap();
        assert_eq!(
            call,
            BridgeCall::RequestBlobDownload {
                blob_url: "blob:https://x/1".to_string(),
                file_name: Some("data".to_string()),
                mime_type: Some("text/csv".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_rejects_non_blob_request() {
        let err = BridgeCall::parse(
            r#"{"op":"requestBlobDownload","blobUrl":"file:///etc/passwd"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DownloadError::BridgeProtocol(_)));
    }

    #[test]
    fn test_parse_report_error_with_and_without_name() {
        assert_eq!(
            BridgeCall::parse(r#"{"op":"reportError","message":"read_error","fileName":"a.csv"}"#)
                .unwrap(),
            BridgeCall::ReportError {
                message: "read_error".to_string(),
                file_name: Some("a.csv".to_string()),
            }
        );
        assert_eq!(
            BridgeCall::parse(r#"{"op":"reportError","message":"read_error"}"#).unwrap(),
            BridgeCall::ReportError {
                message: "read_error".to_string(),
                file_name: None,
            }
        );
    }

    #[test]
    fn test_parse_unknown_op() {
        assert!(BridgeCall::parse(r#"{"op":"deleteEverything"}"#).is_err());
    }

    #[test]
    fn test_install_script_is_guarded() {
        let script = PageBridge::new("AndroidBlobDownloader").install_script();
        assert!(script.starts_with(
            "(function(){if(window['__AndroidBlobDownloader_installed']){return;}"
        ));
        assert!(script.contains("window['__AndroidBlobDownloader_installed']=true;"));
        assert_eq!(script.matches("addEventListener").count(), 1);
        assert!(
            script.contains("window['AndroidBlobDownloader'].requestBlobDownload(href,name,type)")
        );
    }

    #[test]
    fn test_retrieval_script_escapes_parameters() {
        let bridge = PageBridge::new("AndroidBlobDownloader");
        let script = bridge.retrieval_script(
            "blob:https://x/1",
            "evil';alert(1);//\nx.csv",
            Some("text/csv"),
        );
        assert!(script.contains(r"var fileName='evil\';alert(1);//\nx.csv';"));
        assert!(script.contains("var url='blob:https://x/1';"));
        assert!(script.contains("var mimeType='text/csv';"));
        assert!(!script.contains('\n'));
    }

    #[test]
    fn test_retrieval_script_reports_errors() {
        let script = PageBridge::new("B").retrieval_script("blob:x", "a", None);
        assert!(script.contains("window['B'].reportError('read_error',fileName);"));
        assert!(script.contains("err&&err.message?err.message:err),fileName);"));
        assert!(script.contains("var mimeType='';"));
    }
}
