//! Recording fakes for the platform traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::api::platform::{
    FileOpener, RenderingSurface, StoragePermission, TransferManager, UserInterface,
};
use crate::domain::{
    DownloadError, DownloadNotification, FileChooserRequest, JobId, JobRecord, JobStatus, Notice,
    OpenAction, TransferJob,
};

#[derive(Default)]
pub struct RecordingSurface {
    scripts: Mutex<Vec<String>>,
    chooser_results: Mutex<Vec<(u64, Option<Vec<String>>)>>,
}

impl RecordingSurface {
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn chooser_results(&self) -> Vec<(u64, Option<Vec<String>>)> {
        self.chooser_results.lock().unwrap().clone()
    }
}

impl RenderingSurface for RecordingSurface {
    fn evaluate_script(&self, script: &str) {
        self.scripts.lock().unwrap().push(script.to_string());
    }

    fn complete_file_chooser(&self, request_id: u64, files: Option<Vec<String>>) {
        self.chooser_results.lock().unwrap().push((request_id, files));
    }
}

#[derive(Default)]
pub struct FakePermission {
    pub granted: AtomicBool,
    prompts: AtomicUsize,
}

impl FakePermission {
    pub fn granted() -> Self {
        let permission = Self::default();
        permission.granted.store(true, Ordering::SeqCst);
        permission
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl StoragePermission for FakePermission {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request(&self) {
        self.prompts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeTransfers {
    submitted: Mutex<Vec<TransferJob>>,
    records: Mutex<HashMap<JobId, JobRecord>>,
    next_id: AtomicU64,
}

impl FakeTransfers {
    pub fn submitted(&self) -> Vec<TransferJob> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn set(&self, id: JobId, record: JobRecord) {
        self.records.lock().unwrap().insert(id, record);
    }

    /// Moves a submitted job to `status`, keeping its title and MIME type.
    pub fn finish(&self, id: JobId, status: JobStatus, file_uri: Option<&str>) {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).expect("job was submitted");
        record.status = status;
        record.file_uri = file_uri.map(str::to_string);
    }
}

impl TransferManager for FakeTransfers {
    fn submit(&self, job: TransferJob) -> Result<JobId, DownloadError> {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.set(
            id,
            JobRecord {
                status: JobStatus::InProgress,
                file_uri: None,
                mime_type: job.mime_type.clone(),
                title: job.title.clone(),
            },
        );
        self.submitted.lock().unwrap().push(job);
        Ok(id)
    }

    fn query(&self, id: JobId) -> Option<JobRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }
}

#[derive(Default)]
pub struct RecordingUi {
    pub chooser_missing: AtomicBool,
    notices: Mutex<Vec<Notice>>,
    offers: Mutex<Vec<(String, OpenAction)>>,
    notifications: Mutex<Vec<DownloadNotification>>,
    chooser_requests: Mutex<Vec<FileChooserRequest>>,
}

impl RecordingUi {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn offers(&self) -> Vec<(String, OpenAction)> {
        self.offers.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<DownloadNotification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn chooser_requests(&self) -> Vec<FileChooserRequest> {
        self.chooser_requests.lock().unwrap().clone()
    }
}

impl UserInterface for RecordingUi {
    fn show_notice(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    fn offer_open(&self, display_name: &str, action: OpenAction) {
        self.offers
            .lock()
            .unwrap()
            .push((display_name.to_string(), action));
    }

    fn post_notification(&self, notification: DownloadNotification) {
        self.notifications.lock().unwrap().push(notification);
    }

    fn choose_files(&self, request: FileChooserRequest) -> Result<(), DownloadError> {
        if self.chooser_missing.load(Ordering::SeqCst) {
            return Err(DownloadError::FileChooserUnavailable);
        }
        self.chooser_requests.lock().unwrap().push(request);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    pub missing: AtomicBool,
    opened: Mutex<Vec<OpenAction>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<OpenAction> {
        self.opened.lock().unwrap().clone()
    }
}

impl FileOpener for RecordingOpener {
    fn open(&self, action: &OpenAction) -> Result<(), DownloadError> {
        if self.missing.load(Ordering::SeqCst) {
            return Err(DownloadError::NoActivityToHandleOpen);
        }
        self.opened.lock().unwrap().push(action.clone());
        Ok(())
    }
}
