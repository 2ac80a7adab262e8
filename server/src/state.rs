use std::sync::Arc;

use crate::services::{
    CertificateRenderer, CertificateService, EventService, LoggingRenderer, RegistrationService,
    TicketService, VerificationService,
};
use crate::store::{AttendanceLedger, CertificateLedger, EventStore, MemoryStore, TicketStore};

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub events: EventService,
    pub registration: RegistrationService,
    pub tickets: TicketService,
    pub verification: VerificationService,
    pub certificates: CertificateService,
}

impl AppState {
    /// Wire every service to one backend that implements all four stores.
    pub fn new<S>(
        store: Arc<S>,
        renderer: Arc<dyn CertificateRenderer>,
        issuance_concurrency: usize,
    ) -> Self
    where
        S: EventStore + TicketStore + AttendanceLedger + CertificateLedger + 'static,
    {
        let events: Arc<dyn EventStore> = store.clone();
        let tickets: Arc<dyn TicketStore> = store.clone();
        let attendance: Arc<dyn AttendanceLedger> = store.clone();
        let certificate_ledger: Arc<dyn CertificateLedger> = store;

        let certificates = CertificateService::new(
            events.clone(),
            attendance.clone(),
            certificate_ledger,
            renderer,
            issuance_concurrency,
        );

        Self {
            events: EventService::new(events.clone(), attendance.clone(), certificates.clone()),
            registration: RegistrationService::new(events.clone(), tickets.clone()),
            tickets: TicketService::new(events.clone(), tickets.clone()),
            verification: VerificationService::new(events, tickets, attendance),
            certificates,
        }
    }

    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self::new(store, Arc::new(LoggingRenderer), 4)
    }
}
