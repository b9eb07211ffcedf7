//! In-memory fakes of the upstream ports, with call accounting.

use crate::domain::{
    AccessToken, ByteRange, ContentRange, EnsurePdfRecord, SignatureRecord, ValidationRecord,
};
use crate::ports::{
    AuthorityError, ByteStream, DocumentStorage, InvoiceAuthority, ServedRange, StorageError,
    StoredDocument,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A validation record for a valid token bound to `invoice_id`.
pub fn valid_record(invoice_id: Uuid) -> ValidationRecord {
    ValidationRecord {
        is_valid: true,
        error: None,
        invoice_id: Some(invoice_id.to_string()),
        pdf_storage_key: Some("invoices/cached.pdf".into()),
        invoice_number: Some("INV-1001".into()),
        invoice_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        invoice_due_date: None,
        signature_path: None,
        viewed: false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorityCalls {
    pub validate: usize,
    pub ensure_pdf: usize,
    pub viewed: usize,
    pub signature: usize,
}

impl AuthorityCalls {
    /// Calls other than token validation.
    pub fn beyond_validation(&self) -> usize {
        self.ensure_pdf + self.viewed + self.signature
    }
}

struct AuthorityState {
    validate: Result<ValidationRecord, AuthorityError>,
    ensure_pdf: Result<EnsurePdfRecord, AuthorityError>,
    viewed: Result<(), AuthorityError>,
    signature: Result<(), AuthorityError>,
    calls: AuthorityCalls,
    last_signature: Option<String>,
}

/// Scriptable token/invoice authority.
pub struct FakeAuthority {
    state: Mutex<AuthorityState>,
}

impl FakeAuthority {
    pub fn with_record(record: ValidationRecord) -> Self {
        Self {
            state: Mutex::new(AuthorityState {
                validate: Ok(record),
                ensure_pdf: Ok(EnsurePdfRecord {
                    storage_key: Some("invoices/current.pdf".into()),
                    was_regenerated: false,
                }),
                viewed: Ok(()),
                signature: Ok(()),
                calls: AuthorityCalls::default(),
                last_signature: None,
            }),
        }
    }

    pub fn valid(invoice_id: Uuid) -> Self {
        Self::with_record(valid_record(invoice_id))
    }

    pub fn invalid(reason: &str) -> Self {
        Self::with_record(ValidationRecord {
            is_valid: false,
            error: Some(reason.to_string()),
            ..Default::default()
        })
    }

    pub fn fail_validate(&self, error: AuthorityError) {
        self.state.lock().unwrap().validate = Err(error);
    }

    pub fn set_ensure_pdf(&self, result: Result<EnsurePdfRecord, AuthorityError>) {
        self.state.lock().unwrap().ensure_pdf = result;
    }

    pub fn set_viewed(&self, result: Result<(), AuthorityError>) {
        self.state.lock().unwrap().viewed = result;
    }

    pub fn set_signature(&self, result: Result<(), AuthorityError>) {
        self.state.lock().unwrap().signature = result;
    }

    pub fn calls(&self) -> AuthorityCalls {
        self.state.lock().unwrap().calls
    }

    pub fn last_signature(&self) -> Option<String> {
        self.state.lock().unwrap().last_signature.clone()
    }
}

#[async_trait]
impl InvoiceAuthority for FakeAuthority {
    async fn validate_token(&self, _token: &AccessToken) -> Result<ValidationRecord, AuthorityError> {
        let mut state = self.state.lock().unwrap();
        state.calls.validate += 1;
        state.validate.clone()
    }

    async fn ensure_pdf_current(
        &self,
        _token: &AccessToken,
    ) -> Result<EnsurePdfRecord, AuthorityError> {
        let mut state = self.state.lock().unwrap();
        state.calls.ensure_pdf += 1;
        state.ensure_pdf.clone()
    }

    async fn mark_viewed(&self, _token: &AccessToken) -> Result<(), AuthorityError> {
        let mut state = self.state.lock().unwrap();
        state.calls.viewed += 1;
        let result = state.viewed.clone();
        if result.is_ok() {
            if let Ok(record) = state.validate.as_mut() {
                record.viewed = true;
            }
        }
        result
    }

    async fn submit_signature(
        &self,
        _token: &AccessToken,
        signature: &SignatureRecord,
    ) -> Result<(), AuthorityError> {
        let mut state = self.state.lock().unwrap();
        state.calls.signature += 1;
        state.last_signature = Some(signature.signature_path.clone());
        state.signature.clone()
    }
}

/// In-memory document storage.
pub struct FakeStorage {
    documents: HashMap<String, Bytes>,
    honours_range: bool,
    reports_length: bool,
    stalls: bool,
    chunk_size: usize,
    live_bodies: Arc<AtomicUsize>,
    failure: Mutex<Option<StorageError>>,
    fetches: Mutex<Vec<(String, Option<ByteRange>)>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            honours_range: true,
            reports_length: true,
            stalls: false,
            chunk_size: 16,
            live_bodies: Arc::new(AtomicUsize::new(0)),
            failure: Mutex::new(None),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_document(mut self, key: &str, bytes: impl Into<Bytes>) -> Self {
        self.documents.insert(key.to_string(), bytes.into());
        self
    }

    /// Serve whole documents regardless of the requested range.
    pub fn ignoring_ranges(mut self) -> Self {
        self.honours_range = false;
        self
    }

    /// Omit the body length, as a chunked response would.
    pub fn without_length(mut self) -> Self {
        self.reports_length = false;
        self
    }

    /// Keep every body open after its last chunk, like a slow upstream.
    pub fn stalling(mut self) -> Self {
        self.stalls = true;
        self
    }

    /// Bodies handed out and not yet dropped.
    pub fn live_bodies(&self) -> usize {
        self.live_bodies.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, error: StorageError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn fetches(&self) -> Vec<(String, Option<ByteRange>)> {
        self.fetches.lock().unwrap().clone()
    }
}

impl Default for FakeStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// A deterministic document of `len` bytes.
pub fn sample_pdf(len: usize) -> Bytes {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.extend((0..len.saturating_sub(bytes.len())).map(|i| (i % 251) as u8));
    bytes.truncate(len);
    Bytes::from(bytes)
}

#[async_trait]
impl DocumentStorage for FakeStorage {
    async fn fetch(
        &self,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> Result<StoredDocument, StorageError> {
        self.fetches
            .lock()
            .unwrap()
            .push((storage_key.to_string(), range));

        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        let document = self
            .documents
            .get(storage_key)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        let total = document.len() as u64;

        let (bytes, served) = match range.filter(|_| self.honours_range) {
            Some(range) => {
                let resolved = range
                    .resolve(total)
                    .map_err(|_| StorageError::RangeNotSatisfiable { total: Some(total) })?;
                let slice = document.slice(resolved.start as usize..=resolved.end as usize);
                (slice, ServedRange::Partial(ContentRange::new(resolved, total)))
            }
            None => (document, ServedRange::Full),
        };

        let length = bytes.len() as u64;
        let chunks: Vec<Result<Bytes, io::Error>> = bytes
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let tail: ByteStream = if self.stalls {
            stream::pending().boxed()
        } else {
            stream::empty().boxed()
        };
        let guard = LiveBody::open(Arc::clone(&self.live_bodies));
        let body = stream::iter(chunks).chain(tail).map(move |chunk| {
            let _open = &guard;
            chunk
        });

        Ok(StoredDocument {
            body: body.boxed(),
            content_length: self.reports_length.then_some(length),
            served,
        })
    }
}

/// Counts a body as open until the stream holding it is dropped.
struct LiveBody(Arc<AtomicUsize>);

impl LiveBody {
    fn open(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for LiveBody {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Collects formatted log output for the current thread while the guard
/// lives. `#[tokio::test]` runs on the current thread, so async code is
/// covered too.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (capture, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
