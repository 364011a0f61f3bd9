//! The AMPLIFY protein language model.
//!
//! - [GH Amplify Code](https://github.com/chandar-lab/AMPLIFY)
//! - [HF - 120M Model](https://huggingface.co/chandar-lab/AMPLIFY_120M)
//! - [Paper](https://www.biorxiv.org/content/10.1101/2024.09.23.614603v1)
//!
pub mod amplify;
pub mod config;
pub mod encoder;
pub mod pretrained;
pub mod rotary;
pub mod tokenizer;
