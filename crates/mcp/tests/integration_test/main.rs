//! Integration tests driving real subprocesses: the bundled `sqlpipe-server`
//! and `sqlpipe-client` binaries plus small shell scripts that misbehave on
//! purpose.
#![cfg(unix)]

mod client_binary;
mod helpers;
mod misbehaving_servers;
mod server_process;
