//! `armlink-server` – service layer over the arm's address space.
//!
//! # Modules
//!
//! - [`services`] – decoded Browse / Read / Write / Call and session
//!   lifecycle requests, and their responses.
//! - [`dispatcher`] – [`ServiceDispatcher`][dispatcher::ServiceDispatcher]:
//!   session validation, authorization, execution, and the error-to-status
//!   boundary.
//! - [`server`] – [`RobotServer`][server::RobotServer]: builds and wires
//!   every component, and runs the periodic session sweep.

pub mod dispatcher;
pub mod server;
pub mod services;

pub use dispatcher::ServiceDispatcher;
pub use server::{DEFAULT_SWEEP_INTERVAL, RobotServer, RobotServerBuilder};
pub use services::{
    BrowseRequest, BrowseResponse, CallRequest, CallResponse, CloseSessionRequest,
    CloseSessionResponse, CreateSessionRequest, CreateSessionResponse, ReadRequest, ReadResponse,
    ReadResult, ReadValueId, ReferenceDescription, WriteRequest, WriteResponse, WriteValue,
};
