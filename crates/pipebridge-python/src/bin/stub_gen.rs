//! Generate the `pipebridge.pyi` type stubs.
//!
//! Run with: cargo run -p pipebridge-python --bin stub_gen

use pyo3_stub_gen::Result;

fn main() -> Result<()> {
    pipebridge::stub_info()?.generate()?;
    Ok(())
}
