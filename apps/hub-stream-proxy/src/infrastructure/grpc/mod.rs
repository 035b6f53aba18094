//! gRPC Stream Proxy
//!
//! Serves the `StreamProxy` service the hub calls when a client subscribes
//! to a proxied channel or opens a proxied connection.
//!
//! # Architecture
//!
//! Each RPC becomes one [`session::StreamSession`] running on its own task:
//!
//! 1. The session waits for (or receives) the negotiation request
//! 2. It answers with exactly one acknowledgement frame
//! 3. It streams publications through a bounded channel
//! 4. It stops when the hub cancels, the source ends or the server shuts down
//!
//! The generated message and service code is checked in under `proto/` and
//! regenerated by `build.rs` on request.

pub mod schema;
pub mod server;
pub mod session;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod hubstream {
        pub mod proxy {
            pub mod v1 {
                include!("proto/hubstream.proxy.v1.rs");
            }
        }
        pub mod unistream {
            pub mod v1 {
                include!("proto/hubstream.unistream.v1.rs");
            }
            pub mod v2 {
                include!("proto/hubstream.unistream.v2.rs");
            }
        }
    }

    pub use hubstream::proxy::v1 as proxy;
    pub use hubstream::unistream::{v1 as unistream_v1, v2 as unistream_v2};
}

pub use server::{StreamProxyServer, StreamProxyServerConfig};
pub use session::{MalformedPayloadPolicy, SessionError, SessionMode, StreamSession};
