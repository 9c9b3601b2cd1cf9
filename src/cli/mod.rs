//! # CLI Module
//!
//! Command-line entry point for running the dispatch core as an HTTP service.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Serve one in-memory storage per resource name:
//!
//! ```bash
//! brrtrest serve --addr 0.0.0.0:8080 --kinds widgets,gadgets
//! ```
//!
//! Options:
//! - `--addr <ADDR>` - Address and port to bind (default: `0.0.0.0:8080`)
//! - `--prefix <PREFIX>` - API prefix (default: `BRRTR_API_PREFIX` or `/api/v1beta1`)
//! - `--kinds <LIST>` - Comma-separated resource names (default: `widgets`)
//! - `--timeout <DURATION>` - Default wait before answering `202 Accepted`
//! - `--capabilities <LIST>` - Restrict every storage to e.g. `list,get` (others answer `405`)
//! - `--completion-delay <DURATION>` - Delay mutation results, to exercise operations
//! - `--deny-mutations` - Reject every create, update and delete with `403`
//!
//! ```bash
//! curl -X POST localhost:8080/api/v1beta1/widgets -d '{"metadata":{"name":"w1"}}'
//! curl localhost:8080/api/v1beta1/widgets?labels=app%3Dweb
//! curl localhost:8080/api/v1beta1/operations/1
//! ```

mod commands;


pub use commands::{run_cli, Cli, Commands, Item};
