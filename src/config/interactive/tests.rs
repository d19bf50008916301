use super::load_existing_config as load_existing_config_impl;
use super::{parse_document_list, parse_player_command, parse_scratch_dir};
use crate::config::AudioConfig;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.openai.chat_model.is_empty());
    assert!(!config.knowledge_base.collection.is_empty());
    assert!(config.knowledge_base.top_k > 0);
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn load_existing_config_falls_back_on_broken_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[openai")
        .expect("should write config");

    let config = load_existing_config_impl(temp_dir.path()).expect("defaults are used");
    assert_eq!(config.openai.voice, "echo");
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn document_list_parsing() {
    assert_eq!(
        parse_document_list(" resume.pdf, notes/story.pdf ,,"),
        vec![PathBuf::from("resume.pdf"), PathBuf::from("notes/story.pdf")]
    );
    assert!(parse_document_list("").is_empty());
}

#[test]
fn player_command_parsing() {
    assert_eq!(parse_player_command("  mpg123   -q "), vec!["mpg123", "-q"]);
    assert_eq!(parse_player_command("afplay"), vec!["afplay"]);
    assert!(parse_player_command("   ").is_empty());

    let mut audio = AudioConfig::default();
    audio
        .set_player(parse_player_command("ffplay -nodisp -autoexit"))
        .expect("parsed command is valid");
    assert_eq!(audio.player, vec!["ffplay", "-nodisp", "-autoexit"]);
}

#[test]
fn scratch_dir_parsing() {
    assert_eq!(parse_scratch_dir(" tmp/audio "), Some(PathBuf::from("tmp/audio")));
    assert_eq!(parse_scratch_dir(""), None);
    assert_eq!(parse_scratch_dir("   "), None);
}
