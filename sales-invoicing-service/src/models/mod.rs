//! Domain records persisted by the record store.

pub mod actor;
pub mod catalog;
pub mod invoice;
pub mod line_item;
pub mod payment;
pub mod pipeline;

pub use actor::Actor;
pub use catalog::{CatalogService, SalesRep};
pub use invoice::{Invoice, InvoiceFilter, InvoiceStatus};
pub use line_item::ServiceLineItem;
pub use payment::{Payment, PaymentFilter};
pub use pipeline::{PipelineAction, PipelineHistoryEntry, PipelineStage, PipelineState};
