pub mod clock;
pub mod collaborators;
pub mod database;
pub mod invoicing;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use collaborators::{
    AuditEntry, AuditSink, HttpAuditSink, HttpNotifier, LogAuditSink, LogNotifier, Notification,
    Notifier,
};
pub use database::PgStore;
pub use invoicing::{
    InvoiceChanges, InvoiceView, InvoicingService, LineItemChanges, NewInvoice, NewLineItem,
    NewPayment, PaymentChanges,
};
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use pipeline::{PipelineDetail, PipelineFilter, PipelineListItem, StageCount};
pub use store::{InvoiceWrite, RecordStore};
