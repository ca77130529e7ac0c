//! HTTP API
//! Mission: route assembly over the auth and todo handlers

pub mod routes;


pub use routes::create_router;
