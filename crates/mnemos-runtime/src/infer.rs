//! `infer` – one structured generation round trip.
//!
//! 1. validate the input record,
//! 2. optionally recall reinforced neighbours by input and render them as
//!    worked examples,
//! 3. compose the prompt: fixed [`INSTRUCTIONS`], examples, the encoded
//!    `<input>` block, the output-schema description inside the wrapper,
//! 4. generate with the requested model,
//! 5. decode the reply against the output schema.
//!
//! The steps are sequential and share one [`Deadline`].

use mnemos_markup::{decode, decode_loose, describe, encode, encode_as};
use mnemos_memory::{AgentMemory, CompiledAgent, RECALL_LIMIT, RecallMatch, RecallQuery};
use mnemos_schema::validate;
use mnemos_types::{Deadline, Fields, Result};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info_span, warn};

use crate::llm_driver::Generator;

/// Tag wrapping the input record in the prompt.
pub const INPUT_TAG: &str = "input";

/// The markup contract, stated once at the top of every prompt.
pub const INSTRUCTIONS: &str = "\
You receive an input record and a description of the output record you must produce, both written as tagged markup.
Reply with exactly one <output>...</output> block. Text outside that block is ignored.
- Inside <output>, write one tag per output field, named after the field, containing its value.
- Write each array element as an <item> tag inside the field's tag.
- Write nested objects as nested tags, one per declared field.
- Write true or false for booleans and plain digits for numbers.
- Omit optional fields you have no value for; write a self-closing tag such as <field/> for null.
- Escape &, < and > in text as &amp;, &lt; and &gt;.";

/// Per-call knobs of [`infer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferOptions {
    /// Model id handed to the generator.
    pub model: String,
    /// How many recalled neighbours to show as examples, at most
    /// [`RECALL_LIMIT`].  Zero skips recall entirely.
    #[serde(default)]
    pub examples: usize,
}

impl InferOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            examples: 0,
        }
    }

    pub fn with_examples(mut self, examples: usize) -> Self {
        self.examples = examples;
        self
    }
}

/// Outcome of [`infer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    /// The decoded, validated output record.
    pub output: Fields,
    /// The generator's reply, verbatim.
    pub raw: String,
    /// Number of worked examples included in the prompt.
    pub examples: usize,
}

/// Render the prompt for `input`, showing `examples` as solved cases.
pub fn compose_prompt(agent: &CompiledAgent, input: &Fields, examples: &[RecallMatch]) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\n\n");
    if !examples.is_empty() {
        prompt.push_str("Solved examples:\n\n");
        for (n, example) in examples.iter().enumerate() {
            prompt.push_str(&format!("Example {}:\n", n + 1));
            prompt.push_str(&encode_as(INPUT_TAG, &example.input, &agent.input));
            prompt.push('\n');
            prompt.push_str(&encode(&example.output, &agent.output));
            prompt.push_str("\n\n");
        }
    }
    prompt.push_str("Input:\n");
    prompt.push_str(&encode_as(INPUT_TAG, input, &agent.input));
    prompt.push_str("\n\nOutput description:\n");
    prompt.push_str(&describe(&agent.output.schema));
    prompt.push('\n');
    prompt
}

/// Generate an output record for `input`.
pub async fn infer(
    agent: &AgentMemory,
    generator: &dyn Generator,
    input: &Fields,
    options: &InferOptions,
    deadline: Deadline,
) -> Result<Inference> {
    let span = info_span!("infer", agent = %agent.name().as_str(), model = %options.model);
    async move {
        let compiled = agent.agent();
        let input = validate(&compiled.input.schema, input)?;

        let wanted = options.examples.min(RECALL_LIMIT);
        let examples = if wanted > 0 {
            let recalled = agent
                .recall(&RecallQuery::by_input(input.clone()), deadline)
                .await?;
            recalled.matches.into_iter().take(wanted).collect()
        } else {
            Vec::new()
        };

        let prompt = compose_prompt(compiled, &input, &examples);
        debug!(examples = examples.len(), chars = prompt.len(), "prompt composed");
        let raw = generator.generate(&prompt, &options.model, deadline).await?;
        let output = decode(&raw, &compiled.output).inspect_err(|e| {
            let loose = decode_loose(&raw).ok();
            warn!(error = %e, ?loose, "reply does not decode against the output schema");
        })?;
        Ok(Inference {
            output,
            raw,
            examples: examples.len(),
        })
    }
    .instrument(span)
    .await
}
