pub mod client;

pub use client::{CreateInvoiceRequest, Invoice, InvoiceClient, InvoiceStatus, PaymentError};
