use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_dir_is_under_home() {
    let dir = get_config_dir().expect("should resolve config dir");
    assert!(dir.ends_with(".karrybot") || dir.ends_with("karrybot"));
}

#[test]
fn config_file_persistence() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_path = temp_dir.path().join("config.toml");

    let original_config = Config {
        openai: OpenAiConfig {
            base_url: "http://localhost:9999/v1/".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            batch_size: 16,
            ..OpenAiConfig::default()
        },
        knowledge_base: KnowledgeBaseConfig {
            documents: vec!["resume.pdf".into()],
            top_k: 3,
            ..KnowledgeBaseConfig::default()
        },
        ..Config::default()
    };

    let toml_content = toml::to_string_pretty(&original_config)
        .expect("config should convert to toml string successfully");
    fs::write(&config_path, toml_content).expect("should write to config_path successfully");

    let content =
        fs::read_to_string(&config_path).expect("should read from config_path successfully");
    let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

    assert_eq!(original_config, loaded_config);
}

#[test]
fn api_key_is_not_serialized() {
    let toml_content =
        toml::to_string_pretty(&Config::default()).expect("config should serialize");
    assert!(!toml_content.contains("api_key"));
}

#[test]
fn invalid_toml_handling() {
    let invalid_toml = r#"
        [openai
        chat_model = "gpt-3.5-turbo"
        batch_size = "many"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
fn wrong_value_type_is_rejected() {
    let invalid_toml = r#"
        [knowledge_base]
        top_k = "ten"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
    assert!(result.is_err());
}

#[test]
fn complete_valid_config() {
    let valid_toml = r#"
        [openai]
        base_url = "https://api.openai.com/v1/"
        chat_model = "gpt-3.5-turbo"
        embedding_model = "text-embedding-ada-002"
        transcription_model = "whisper-1"
        speech_model = "tts-1"
        voice = "echo"
        batch_size = 64
        request_timeout_secs = 60

        [knowledge_base]
        path = "knowledge_base"
        collection = "FAQs"
        documents = ["short.pdf", "resume.pdf"]
        top_k = 10

        [chunking]
        chunk_size = 1000
        chunk_overlap = 200

        [assistant]
        name = "Karthik"
        subject = "Karthik Rajan"

        [audio]
        player = ["mpg123", "-q"]
    "#;

    let config: Config = toml::from_str(valid_toml).expect("should parse toml successfully");
    assert!(config.validate().is_ok());
    assert_eq!(config.knowledge_base.documents.len(), 2);
    assert_eq!(config.audio.player, vec!["mpg123", "-q"]);
    assert_eq!(config.audio.scratch_dir, None);
}

#[test]
fn error_display_messages() {
    let errors = vec![
        ConfigError::InvalidUrl("invalid-url".to_string()),
        ConfigError::InvalidBatchSize(0),
        ConfigError::InvalidModel("chat"),
        ConfigError::InvalidVoice(String::new()),
        ConfigError::InvalidTimeout(0),
        ConfigError::InvalidCollectionName("a b".to_string()),
        ConfigError::InvalidTopK(0),
        ConfigError::InvalidChunkOverlap(300, 200),
    ];

    for error in errors {
        let message = format!("{error}");
        assert!(!message.is_empty());
        assert!(message.len() > 10);
    }
}
