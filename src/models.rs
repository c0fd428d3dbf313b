use clap::{builder::PossibleValue, ValueEnum};
use tiktoken_rs::cl100k_base;
use tracing::error;

/// Tokens are a ChatGPT concept which represent normally a third of a word (or 75%).
pub type Tokens = u32;

/// Utility for estimating the number of ChatGPT tokens in a piece of text.
pub trait Token: AsRef<str> {
	/// Count the number of tokens in the text.
	///
	/// Returns `None` when the tokenizer cannot be loaded.
	fn count_tokens(&self) -> Option<Tokens> {
		let bpe = cl100k_base()
			.map_err(|e| {
				error!("Failed to load cl100k_base tokenizer: {}", e);
				e
			})
			.ok()?;
		let tokens = bpe.encode_with_special_tokens(self.as_ref());

		Some(Tokens::try_from(tokens.len()).unwrap_or(Tokens::MAX))
	}
}

impl Token for String {}
impl Token for str {}

/// The ChatGPT language models that are available to use.
#[derive(PartialEq, Eq, Clone, Debug, Copy, Default)]
pub enum Models {
	#[default]
	GPT4oMini,
	GPT4o,
	GPT4Turbo,
	GPT35Turbo,
}

/// Clap value enum implementation for argument parsing.
impl ValueEnum for Models {
	fn value_variants<'a>() -> &'a [Self] {
		&[Self::GPT4oMini, Self::GPT4o, Self::GPT4Turbo, Self::GPT35Turbo]
	}

	fn to_possible_value(&self) -> Option<PossibleValue> {
		Some(PossibleValue::new(self.name()))
	}
}

impl Models {
	/// Get the model name.
	pub fn name(&self) -> &'static str {
		match self {
			Self::GPT4oMini => "gpt-4o-mini",
			Self::GPT4o => "gpt-4o",
			Self::GPT4Turbo => "gpt-4-turbo",
			Self::GPT35Turbo => "gpt-3.5-turbo",
		}
	}

	/// Maximum number of tokens that can be processed at once by ChatGPT.
	pub fn max_context_tokens(&self) -> Tokens {
		match self {
			Self::GPT4oMini | Self::GPT4o | Self::GPT4Turbo => 128_000,
			Self::GPT35Turbo => 16_385,
		}
	}
}
