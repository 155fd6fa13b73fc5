use crate::codegen::{self, CodeSample};
use crate::config::PlaygroundConfig;
use crate::error::Result;
use crate::types::{GenerationParameters, Message};

/// Execute the `code` command: print a sample request for `prompt`.
///
/// `model` overrides the configured upstream model.
pub fn execute(
    language: &str,
    prompt: &str,
    model: Option<&str>,
    params: &GenerationParameters,
) -> Result<()> {
    let config = PlaygroundConfig::load()?;
    let sample = sample_for(&config, prompt, model, params);
    println!("{}", codegen::generate(language, &sample));
    Ok(())
}

fn sample_for(
    config: &PlaygroundConfig,
    prompt: &str,
    model: Option<&str>,
    params: &GenerationParameters,
) -> CodeSample {
    let model = model.unwrap_or(config.upstream.model.as_str());
    CodeSample::new(model, vec![Message::user(prompt)], params).with_endpoint(
        format!(
            "{}/chat/completions",
            config.upstream.base_url.trim_end_matches('/')
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_uses_configured_upstream() {
        let mut config = PlaygroundConfig::default();
        config.upstream.base_url = "http://localhost:8000/v1/".to_string();
        config.upstream.model = "local-model".to_string();

        let sample = sample_for(&config, "hello", None, &GenerationParameters::default());
        assert_eq!(sample.endpoint, "http://localhost:8000/v1/chat/completions");
        assert_eq!(sample.model, "local-model");
        assert_eq!(sample.messages, vec![Message::user("hello")]);
    }

    #[test]
    fn test_default_sample_endpoint() {
        let sample = sample_for(
            &PlaygroundConfig::default(),
            "hello",
            None,
            &GenerationParameters::default(),
        );
        assert_eq!(sample.endpoint, codegen::SAMPLE_ENDPOINT);
    }

    #[test]
    fn test_model_override() {
        let sample = sample_for(
            &PlaygroundConfig::default(),
            "hello",
            Some("sutra-r0"),
            &GenerationParameters::default(),
        );
        assert_eq!(sample.model, "sutra-r0");
        assert!(codegen::generate("curl", &sample).contains("\"model\": \"sutra-r0\""));
    }
}
