//! `infer` and the local client against an in-memory store and a scripted
//! generator.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mnemos_memory::{Database, HashEmbedder, Memory, RecallQuery};
use mnemos_runtime::{Client, Generator, InferOptions, Mode};
use mnemos_types::{AgentName, Deadline, FieldDescriptor, Fields, MnemosError, RecordSchema, Result};
use serde_json::json;

fn fields(v: serde_json::Value) -> Fields {
    v.as_object().cloned().unwrap()
}

/// Returns a canned reply and remembers the last prompt and model.
struct Scripted {
    reply: String,
    seen: Mutex<Option<(String, String)>>,
}

impl Scripted {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            seen: Mutex::new(None),
        })
    }

    fn prompt(&self) -> String {
        self.seen.lock().unwrap().clone().unwrap().0
    }
}

#[async_trait]
impl Generator for Scripted {
    async fn generate(&self, prompt: &str, model: &str, _deadline: Deadline) -> Result<String> {
        *self.seen.lock().unwrap() = Some((prompt.to_string(), model.to_string()));
        Ok(self.reply.clone())
    }
}

fn local(generator: Arc<Scripted>) -> Client {
    let memory = Memory::new(
        Arc::new(Database::open_in_memory().unwrap()),
        Arc::new(HashEmbedder::new(128)),
    );
    Client::local(memory, generator)
}

fn qa_schemas() -> (RecordSchema, RecordSchema) {
    (
        RecordSchema::new().field("question", FieldDescriptor::string()),
        RecordSchema::new()
            .field("think", FieldDescriptor::string().optional())
            .field("answer", FieldDescriptor::string())
            .field("tags", FieldDescriptor::array(FieldDescriptor::string())),
    )
}

#[tokio::test]
async fn infer_decodes_the_last_wrapper_and_splices_think() {
    let reply = "\
Let me restate the format: <output><answer>...</answer></output>
<think>France's capital is Paris.</think>
<output>
  <answer>Paris</answer>
  <tags><item>geo</item></tags>
</output>";
    let generator = Scripted::new(reply);
    let client = local(generator.clone());
    let (input, output) = qa_schemas();
    let qa = AgentName::parse("qa").unwrap();
    client.init(&qa, &input, &output).unwrap();

    let inference = client
        .infer(
            &qa,
            &fields(json!({"question": "capital of France?"})),
            &InferOptions::new("llama3"),
            Deadline::none(),
        )
        .await
        .unwrap();
    assert_eq!(
        inference.output,
        fields(json!({"think": "France's capital is Paris.", "answer": "Paris", "tags": ["geo"]}))
    );
    assert_eq!(inference.examples, 0);
    assert_eq!(inference.raw, reply);
    assert!(generator.prompt().contains("<question>capital of France?</question>"));
    assert_eq!(generator.seen.lock().unwrap().as_ref().unwrap().1, "llama3");
}

#[tokio::test]
async fn infer_shows_recalled_examples() {
    let generator = Scripted::new("<output><answer>Madrid</answer><tags></tags></output>");
    let client = local(generator.clone());
    let (input, output) = qa_schemas();
    let qa = AgentName::parse("qa").unwrap();
    client.init(&qa, &input, &output).unwrap();
    client
        .reinforce(
            &qa,
            &fields(json!({"question": "capital of France?"})),
            &fields(json!({"answer": "Paris", "tags": ["geo"]})),
            Deadline::none(),
        )
        .await
        .unwrap();

    let inference = client
        .infer(
            &qa,
            &fields(json!({"question": "capital of Spain?"})),
            &InferOptions::new("llama3").with_examples(3),
            Deadline::none(),
        )
        .await
        .unwrap();
    assert_eq!(inference.examples, 1);
    assert_eq!(inference.output, fields(json!({"answer": "Madrid", "tags": []})));
    let prompt = generator.prompt();
    assert!(prompt.contains("Example 1:"));
    assert!(prompt.contains("<answer>Paris</answer>"));
}

#[tokio::test]
async fn infer_surfaces_decode_and_validation_failures() {
    let (input, output) = qa_schemas();
    let qa = AgentName::parse("qa").unwrap();

    let client = local(Scripted::new("I cannot answer that."));
    client.init(&qa, &input, &output).unwrap();
    let err = client
        .infer(&qa, &fields(json!({"question": "?"})), &InferOptions::new("m"), Deadline::none())
        .await
        .unwrap_err();
    assert_eq!(err, MnemosError::WrapperNotFound("output".into()));

    let client = local(Scripted::new("<output><tags></tags></output>"));
    client.init(&qa, &input, &output).unwrap();
    let err = client
        .infer(&qa, &fields(json!({"question": "?"})), &InferOptions::new("m"), Deadline::none())
        .await
        .unwrap_err();
    assert!(err.is_validation());

    // An invalid input never reaches the generator.
    let generator = Scripted::new("<output/>");
    let client = local(generator.clone());
    client.init(&qa, &input, &output).unwrap();
    let err = client
        .infer(&qa, &fields(json!({})), &InferOptions::new("m"), Deadline::none())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(generator.seen.lock().unwrap().is_none());
}

#[tokio::test]
async fn local_client_covers_the_record_lifecycle() {
    let client = local(Scripted::new(""));
    assert_eq!(client.mode(), Mode::Local);
    let (input, output) = qa_schemas();
    let qa = AgentName::parse("qa").unwrap();
    client.init(&qa, &input, &output).unwrap();

    let id = client
        .reinforce(
            &qa,
            &fields(json!({"question": "x"})),
            &fields(json!({"answer": "y", "tags": ["a", "b"]})),
            Deadline::none(),
        )
        .await
        .unwrap();
    let edited = client
        .edit(&qa, &id, None, Some(&fields(json!({"answer": "z"}))), Deadline::none())
        .await
        .unwrap();
    assert_eq!(edited.output, fields(json!({"answer": "z", "tags": ["a", "b"]})));
    assert_eq!(client.get(&qa, &id, Deadline::none()).await.unwrap(), edited);

    let recalled = client
        .recall(&qa, &RecallQuery::by_output(fields(json!({"answer": "z"}))), Deadline::none())
        .await
        .unwrap();
    assert_eq!(recalled.matches[0].id, id);

    assert!(client.delete(&qa, &id, Deadline::none()).await.unwrap());
    assert!(client.delete(&qa, &id, Deadline::none()).await.is_ok());
    assert!(client.find(&qa, None, None, Deadline::none()).await.unwrap().is_empty());

    assert_eq!(client.list_agents().unwrap().len(), 1);
    assert!(client.erase(&qa).unwrap());
    assert!(client.get(&qa, &id, Deadline::none()).await.unwrap_err().is_not_found());
}
