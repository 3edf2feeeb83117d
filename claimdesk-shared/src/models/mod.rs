/// Database models for ClaimDesk
///
/// Each model owns its SQL. Functions take the store handle explicitly:
/// read paths take `&PgPool`, write paths that participate in a lifecycle
/// transaction take `&mut PgConnection` so callers can pass `&mut *tx`.
///
/// # Models
///
/// - `department`: Organisational departments (reference data)
/// - `user`: Accounts, roles, and the one-level manager relation
/// - `claim`: Expense claims and their line items
/// - `receipt`: Uploaded receipt metadata
/// - `approval`: Immutable approve/reject audit records
/// - `notification`: Per-user notification rows
/// - `dashboard`: Aggregation queries for the manager dashboard

pub mod approval;
pub mod claim;
pub mod dashboard;
pub mod department;
pub mod notification;
pub mod receipt;
pub mod user;
