// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod receipt;
pub mod report;
pub mod tag;
pub mod user;

pub use receipt::{NewReceipt, PaymentMode, Receipt, ReceiptChanges, ReceiptWithUploader};
pub use tag::{Tag, TagWithCount};
pub use user::{NewUser, User, UserRole};
