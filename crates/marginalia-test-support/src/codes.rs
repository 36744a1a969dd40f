//! Test code generator: hands out a predetermined list of voucher codes.

use std::sync::Mutex;

use marginalia_core::codes::CodeGenerator;

/// Returns codes from a fixed list, then `TEST-<n>` once the list runs out.
#[derive(Debug)]
pub struct SequenceCodeGenerator {
    codes: Vec<String>,
    index: Mutex<usize>,
}

impl SequenceCodeGenerator {
    /// Create a generator returning `codes` in order.
    #[must_use]
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: codes.iter().map(|c| (*c).to_owned()).collect(),
            index: Mutex::new(0),
        }
    }
}

impl CodeGenerator for SequenceCodeGenerator {
    fn next_code(&self) -> String {
        let mut index = self.index.lock().unwrap();
        let code = self
            .codes
            .get(*index)
            .cloned()
            .unwrap_or_else(|| format!("TEST-{index}"));
        *index += 1;
        code
    }
}
