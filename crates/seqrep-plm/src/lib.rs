//! seqrep-plm
//!
//! Candle implementation of the AMPLIFY protein language model, plus the
//! loading machinery needed to run it for inference:
//!
//! - model weights from the Hugging Face Hub or a local checkpoint directory
//! - tokenization of residue sequences with BOS/EOS handling and batch padding
//! - device selection (CUDA / Metal / CPU)
//!
//! - [AMPLIFY code](https://github.com/chandar-lab/AMPLIFY)
//! - [AMPLIFY 120M on HF](https://huggingface.co/chandar-lab/AMPLIFY_120M)
//!
pub mod amplify;
mod device;

pub use amplify::amplify::{Amplify, ModelOutput};
pub use amplify::config::AmplifyConfig;
pub use amplify::pretrained::{load_model_and_tokenizer, AmplifyModels, ModelFiles, DTYPE};
pub use amplify::tokenizer::ProteinTokenizer;
pub use device::device;
