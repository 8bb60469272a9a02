//! Built-in processors.
//!
//! Requests with a `CREATE` verb carry form-encoded bodies of the shape
//! `Action=<Name>&key=value...`; [`FormActionFactory`] routes them by action
//! name to registered [`ActionHandler`]s. Credential actions live outside this
//! crate and plug in through that trait.

pub mod form_action;
pub mod status;

pub use form_action::{ActionHandler, ActionRequest, FormActionFactory, ACTION_PARAM};
pub use status::{server_status, STATUS_ACTION};
