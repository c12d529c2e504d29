//! # gallery-keeper CLI
//!
//! Command-line front end for the gallery engine.
//!
//! ## Usage
//! ```bash
//! gallery-keeper scan ~/Pictures
//! gallery-keeper groups --output json
//! gallery-keeper quarantine ~/Pictures/IMG_0001.jpg
//! ```

mod cli;

use gallery_keeper::Result;

fn main() -> Result<()> {
    cli::run()
}
