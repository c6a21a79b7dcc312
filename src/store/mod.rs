pub mod receipts;

pub use receipts::{Receipt, ReceiptStatus, ReceiptStore};
