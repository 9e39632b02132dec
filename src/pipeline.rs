//! Text-to-speech pipeline
//!
//! One inbound message goes through decode -> synthesize -> WAV decode ->
//! play. Any failure along the way is confined to that message: it is
//! logged with the text and style id and then dropped, and the pipeline is
//! ready for the next one. There is no retry.

use crate::assets::{AssetLocator, AssetNames, DirectoryTree, EngineAssets};
use crate::audio::{decode_wav, PlaybackSink};
use crate::config::PipelineConfig;
use crate::message::{decode, StyleId, StyledText};
use crate::speech::{synthesize, SynthesisEngine};
use crate::{Result, VvspeakError};
use log::{debug, error, info, warn};

/// What happened to one message
#[derive(Debug)]
pub enum Disposition {
    /// Synthesized and played to completion
    Played(StyledText),
    /// Nothing to say (empty payload, empty text, bad encoding)
    Skipped(VvspeakError),
    /// Synthesis, decoding or playback failed
    Failed(VvspeakError),
}

/// Engine, sink and default style, ready to serve messages
pub struct Pipeline<E: SynthesisEngine, S: PlaybackSink> {
    engine: E,
    sink: S,
    default_style_id: StyleId,
}

impl<E: SynthesisEngine, S: PlaybackSink> Pipeline<E, S> {
    /// Assemble a pipeline from an already initialized engine
    pub fn new(engine: E, sink: S, default_style_id: StyleId) -> Self {
        Self {
            engine,
            sink,
            default_style_id,
        }
    }

    /// Startup sequence: resolve assets, build the engine, then the sink
    ///
    /// `build_engine` is only called once every asset has been found, and
    /// `build_sink` only once the engine is up. Asset and engine errors are
    /// fatal; there is no partially initialized pipeline. Playback problems
    /// are the sink's to report per utterance.
    pub fn start<T, F, G>(
        config: &PipelineConfig,
        names: &AssetNames,
        locator: &AssetLocator<T>,
        build_engine: F,
        build_sink: G,
    ) -> Result<Self>
    where
        T: DirectoryTree,
        F: FnOnce(&EngineAssets) -> Result<E>,
        G: FnOnce() -> S,
    {
        let names = AssetNames {
            voice_model: config.voice_model_file_name.clone(),
            ..names.clone()
        };
        let assets = locator.resolve(&config.engine_root_dir, &names)?;
        let engine = build_engine(&assets)?;
        let sink = build_sink();

        info!(
            "Pipeline ready (default style_id={})",
            config.default_style_id
        );
        Ok(Self::new(engine, sink, config.default_style_id))
    }

    pub fn default_style_id(&self) -> StyleId {
        self.default_style_id
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Handle a raw payload as delivered by the transport
    pub fn handle_bytes(&mut self, payload: &[u8]) -> Disposition {
        match String::from_utf8(payload.to_vec()) {
            Ok(text) => self.handle(&text),
            Err(e) => {
                warn!(
                    "Message is not valid UTF-8 ({} bytes), skipping: {}",
                    payload.len(),
                    e
                );
                Disposition::Skipped(VvspeakError::Utf8(e))
            }
        }
    }

    /// Handle one text message; never fails, the outcome is returned
    pub fn handle(&mut self, payload: &str) -> Disposition {
        if payload.is_empty() {
            warn!("Empty message received, skipping");
            return Disposition::Skipped(VvspeakError::EmptyMessage);
        }

        let styled = match decode(payload, self.default_style_id) {
            Ok(styled) => styled,
            Err(e) => {
                warn!("Empty text received, skipping (raw={:?})", payload);
                return Disposition::Skipped(e);
            }
        };

        info!("TTS(style_id={}): 「{}」", styled.style_id, styled.text);

        match self.speak(&styled) {
            Ok(()) => {
                debug!("Playback finished (style_id={})", styled.style_id);
                Disposition::Played(styled)
            }
            Err(e) => {
                error!(
                    "TTS failed (style_id={}, text={:?}, raw={:?}): {}",
                    styled.style_id, styled.text, payload, e
                );
                Disposition::Failed(e)
            }
        }
    }

    fn speak(&mut self, styled: &StyledText) -> Result<()> {
        let wav = synthesize(&mut self.engine, styled)?;
        let audio = decode_wav(&wav)?;
        self.sink.play(&audio)
    }
}
