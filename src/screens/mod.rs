pub mod wheel;

use crate::receipt::ReceiptData;

#[derive(Debug, Clone)]
pub enum ScreenAction {
    None,
    /// An activity was accepted; hand its receipt to the printer.
    PrintReceipt(ReceiptData),
    Exit,
}
