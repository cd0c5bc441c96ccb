//! Privately verifiable proofs of retrievability
//!
//! This library implements the Shacham-Waters compact PoR scheme with
//! private verification: a client stores a file on an untrusted server, and
//! at any later time an auditor holding a small secret state can issue a
//! short random challenge whose answer proves, with overwhelming
//! probability, that the server still holds the file.
//!
//! ## Main Components
//!
//! - [`heartbeat`]: the engine — setup, encode, challenge, prove, verify
//! - [`tag`], [`state`], [`challenge`], [`proof`]: the ceremony objects that
//!   cross the client/server/auditor boundary
//! - [`prf`]: the keyed map from indices to bounded field elements
//! - [`wire`]: deterministic big-endian framing plus the base64 text form
//! - [`file`]: sequential and positioned file access abstractions
//! - [`config`]: centralized constants
//!
//! ## Error Handling
//!
//! Fallible operations return `Result<T, PorError>`. Verification is the
//! one deliberate exception to error-as-failure: a proof that does not
//! check out is a normal domain result (`Ok(false)`), not an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use heartbeat_por::{Heartbeat, StreamFile, Wire};
//! use std::io::Cursor;
//!
//! // Client: generate parameters and encode the file.
//! let hb = Heartbeat::new(1.0, 10, 128)?;
//! let data = b"the file placed on the storage server".to_vec();
//! let (tag, state) = hb.encode(&mut StreamFile::new(Cursor::new(data.clone())))?;
//!
//! // The server gets the file, the tag, and the public engine.
//! let server_hb = hb.public();
//!
//! // Auditor: issue a challenge against the sealed state.
//! let challenge = hb.gen_challenge(&state)?;
//!
//! // Server: answer it with random access to the stored file.
//! let proof = server_hb.prove(&mut StreamFile::new(Cursor::new(data)), &challenge, &tag)?;
//!
//! // Auditor: check the response.
//! assert!(hb.verify(&proof, &challenge, &state)?);
//! # Ok::<(), heartbeat_por::PorError>(())
//! ```

pub mod challenge;
pub mod config;
pub mod error;
pub mod file;
pub mod heartbeat;
pub mod prf;
pub mod prime;
pub mod proof;
pub mod state;
pub mod tag;
pub mod wire;

// Re-export commonly used types for convenience
pub use challenge::Challenge;
pub use error::{PorError, Result};
pub use file::{SeekableFile, SimpleFile, StreamFile};
pub use heartbeat::Heartbeat;
pub use prf::Prf;
pub use proof::Proof;
pub use state::State;
pub use tag::Tag;
pub use wire::Wire;
