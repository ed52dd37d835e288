//! Version subcommand implementation

use chatlink::common::CLIENT_VERSION;

pub fn run() {
    println!("chatlink {}", env!("CARGO_PKG_VERSION"));
    println!("protocol client version {}", CLIENT_VERSION);
}
