pub mod claude;
pub mod error;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use error::AiError;
pub use traits::{GenerationPrompt, TextGenerator};
pub use util::{extract_fenced_block, strip_code_blocks, truncate_to_char_boundary};
