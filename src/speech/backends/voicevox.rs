//! VOICEVOX core backend
//!
//! Loads the VOICEVOX core C API from the discovered shared library at
//! runtime, so nothing has to be linked at build time. Startup follows the
//! order the core requires:
//! 1. load ONNX Runtime (`voicevox_onnxruntime_load_once`)
//! 2. open the OpenJTalk dictionary
//! 3. create the synthesizer
//! 4. open, load and close the voice model
//!
//! The ONNX Runtime handle is a process-wide singleton owned by the core and
//! is never freed. The synthesizer and dictionary are deleted on drop.

use crate::assets::EngineAssets;
use crate::message::StyleId;
use crate::speech::SynthesisEngine;
use crate::{Result, VvspeakError};
use libloading::Library;
use log::{debug, info};
use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::ptr;
use std::str::FromStr;

type ResultCode = i32;
const RESULT_OK: ResultCode = 0;

#[repr(C)]
struct Onnxruntime {
    _private: [u8; 0],
}

#[repr(C)]
struct OpenJtalkRc {
    _private: [u8; 0],
}

#[repr(C)]
struct Synthesizer {
    _private: [u8; 0],
}

#[repr(C)]
struct VoiceModelFile {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Clone, Copy)]
struct LoadOnnxruntimeOptions {
    filename: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct InitializeOptions {
    acceleration_mode: i32,
    cpu_num_threads: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct TtsOptions {
    enable_interrogative_upspeak: bool,
}

type OnnxruntimeLoadOnceFn =
    unsafe extern "C" fn(LoadOnnxruntimeOptions, *mut *const Onnxruntime) -> ResultCode;
type OpenJtalkRcNewFn = unsafe extern "C" fn(*const c_char, *mut *mut OpenJtalkRc) -> ResultCode;
type OpenJtalkRcDeleteFn = unsafe extern "C" fn(*mut OpenJtalkRc);
type MakeDefaultInitializeOptionsFn = unsafe extern "C" fn() -> InitializeOptions;
type SynthesizerNewFn = unsafe extern "C" fn(
    *const Onnxruntime,
    *const OpenJtalkRc,
    InitializeOptions,
    *mut *mut Synthesizer,
) -> ResultCode;
type SynthesizerDeleteFn = unsafe extern "C" fn(*mut Synthesizer);
type VoiceModelFileOpenFn =
    unsafe extern "C" fn(*const c_char, *mut *mut VoiceModelFile) -> ResultCode;
type VoiceModelFileDeleteFn = unsafe extern "C" fn(*mut VoiceModelFile);
type SynthesizerLoadVoiceModelFn =
    unsafe extern "C" fn(*const Synthesizer, *const VoiceModelFile) -> ResultCode;
type MakeDefaultTtsOptionsFn = unsafe extern "C" fn() -> TtsOptions;
type SynthesizerTtsFn = unsafe extern "C" fn(
    *const Synthesizer,
    *const c_char,
    StyleId,
    TtsOptions,
    *mut usize,
    *mut *mut u8,
) -> ResultCode;
type WavFreeFn = unsafe extern "C" fn(*mut u8);
type ErrorResultToMessageFn = unsafe extern "C" fn(ResultCode) -> *const c_char;

/// Function pointers resolved from the core library
///
/// Only valid while the `Library` they came from is loaded.
struct CoreApi {
    onnxruntime_load_once: OnnxruntimeLoadOnceFn,
    open_jtalk_rc_new: OpenJtalkRcNewFn,
    open_jtalk_rc_delete: OpenJtalkRcDeleteFn,
    make_default_initialize_options: MakeDefaultInitializeOptionsFn,
    synthesizer_new: SynthesizerNewFn,
    synthesizer_delete: SynthesizerDeleteFn,
    voice_model_file_open: VoiceModelFileOpenFn,
    voice_model_file_delete: VoiceModelFileDeleteFn,
    synthesizer_load_voice_model: SynthesizerLoadVoiceModelFn,
    make_default_tts_options: MakeDefaultTtsOptionsFn,
    synthesizer_tts: SynthesizerTtsFn,
    wav_free: WavFreeFn,
    error_result_to_message: ErrorResultToMessageFn,
}

/// # Safety
/// `T` must be the function pointer type of the exported symbol `name`.
unsafe fn symbol<T: Copy>(
    lib: &Library,
    name: &[u8],
) -> std::result::Result<T, libloading::Error> {
    Ok(*lib.get::<T>(name)?)
}

impl CoreApi {
    /// # Safety
    /// `lib` must be a VOICEVOX core library exporting the 0.16 C API.
    unsafe fn load(lib: &Library) -> std::result::Result<Self, libloading::Error> {
        Ok(Self {
            onnxruntime_load_once: symbol(lib, b"voicevox_onnxruntime_load_once\0")?,
            open_jtalk_rc_new: symbol(lib, b"voicevox_open_jtalk_rc_new\0")?,
            open_jtalk_rc_delete: symbol(lib, b"voicevox_open_jtalk_rc_delete\0")?,
            make_default_initialize_options: symbol(
                lib,
                b"voicevox_make_default_initialize_options\0",
            )?,
            synthesizer_new: symbol(lib, b"voicevox_synthesizer_new\0")?,
            synthesizer_delete: symbol(lib, b"voicevox_synthesizer_delete\0")?,
            voice_model_file_open: symbol(lib, b"voicevox_voice_model_file_open\0")?,
            voice_model_file_delete: symbol(lib, b"voicevox_voice_model_file_delete\0")?,
            synthesizer_load_voice_model: symbol(lib, b"voicevox_synthesizer_load_voice_model\0")?,
            make_default_tts_options: symbol(lib, b"voicevox_make_default_tts_options\0")?,
            synthesizer_tts: symbol(lib, b"voicevox_synthesizer_tts\0")?,
            wav_free: symbol(lib, b"voicevox_wav_free\0")?,
            error_result_to_message: symbol(lib, b"voicevox_error_result_to_message\0")?,
        })
    }

    /// Human-readable message for a result code
    fn message(&self, code: ResultCode) -> String {
        let msg = unsafe { (self.error_result_to_message)(code) };
        if msg.is_null() {
            format!("VOICEVOX error code {}", code)
        } else {
            unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
        }
    }
}

/// Hardware the synthesizer runs inference on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acceleration {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl Acceleration {
    fn as_raw(self) -> i32 {
        match self {
            Acceleration::Auto => 0,
            Acceleration::Cpu => 1,
            Acceleration::Gpu => 2,
        }
    }
}

impl FromStr for Acceleration {
    type Err = VvspeakError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Acceleration::Auto),
            "cpu" => Ok(Acceleration::Cpu),
            "gpu" => Ok(Acceleration::Gpu),
            other => Err(VvspeakError::Config(format!(
                "Unknown acceleration mode '{}' (expected auto, cpu or gpu)",
                other
            ))),
        }
    }
}

/// Synthesizer construction options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineOptions {
    pub acceleration: Acceleration,
    /// 0 lets the engine decide
    pub cpu_threads: u16,
}

/// Loaded VOICEVOX core with one voice model
pub struct VoicevoxEngine {
    api: CoreApi,
    synthesizer: *mut Synthesizer,
    open_jtalk: *mut OpenJtalkRc,
    tts_options: TtsOptions,
    // Declared last so it is unloaded after the handles above are deleted
    _library: Library,
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| VvspeakError::EngineInit(format!("Path is not UTF-8: {:?}", path)))?;
    CString::new(s)
        .map_err(|_| VvspeakError::EngineInit(format!("Path contains NUL: {:?}", path)))
}

impl VoicevoxEngine {
    /// Load the engine from resolved assets and load the voice model into it
    pub fn new(assets: &EngineAssets, options: EngineOptions) -> Result<Self> {
        debug!("Loading VOICEVOX core from {}", assets.core_library.display());

        let library = unsafe { Library::new(&assets.core_library) }.map_err(|e| {
            VvspeakError::EngineInit(format!(
                "Failed to load {}: {}",
                assets.core_library.display(),
                e
            ))
        })?;
        let api = unsafe { CoreApi::load(&library) }
            .map_err(|e| VvspeakError::EngineInit(format!("Missing VOICEVOX symbol: {}", e)))?;

        // 1. ONNX Runtime
        let runtime_path = path_to_cstring(&assets.runtime_library)?;
        let mut onnxruntime: *const Onnxruntime = ptr::null();
        let code = unsafe {
            (api.onnxruntime_load_once)(
                LoadOnnxruntimeOptions {
                    filename: runtime_path.as_ptr(),
                },
                &mut onnxruntime,
            )
        };
        if code != RESULT_OK {
            return Err(VvspeakError::EngineInit(format!(
                "Failed to load ONNX Runtime: {}",
                api.message(code)
            )));
        }

        // 2. OpenJTalk dictionary
        let dict_path = path_to_cstring(&assets.dictionary_dir)?;
        let mut open_jtalk: *mut OpenJtalkRc = ptr::null_mut();
        let code = unsafe { (api.open_jtalk_rc_new)(dict_path.as_ptr(), &mut open_jtalk) };
        if code != RESULT_OK {
            return Err(VvspeakError::EngineInit(format!(
                "Failed to open OpenJTalk dictionary: {}",
                api.message(code)
            )));
        }

        // 3. Synthesizer
        let mut init = unsafe { (api.make_default_initialize_options)() };
        init.acceleration_mode = options.acceleration.as_raw();
        if options.cpu_threads > 0 {
            init.cpu_num_threads = options.cpu_threads;
        }
        let mut synthesizer: *mut Synthesizer = ptr::null_mut();
        let code =
            unsafe { (api.synthesizer_new)(onnxruntime, open_jtalk, init, &mut synthesizer) };
        if code != RESULT_OK {
            let msg = api.message(code);
            unsafe { (api.open_jtalk_rc_delete)(open_jtalk) };
            return Err(VvspeakError::EngineInit(format!(
                "Failed to create synthesizer: {}",
                msg
            )));
        }

        let tts_options = unsafe { (api.make_default_tts_options)() };
        let engine = Self {
            api,
            synthesizer,
            open_jtalk,
            tts_options,
            _library: library,
        };

        // 4. Voice model; dropping `engine` on failure releases the handles
        engine.load_voice_model(&assets.voice_model)?;
        info!("VOICEVOX synthesizer initialized");

        Ok(engine)
    }

    fn load_voice_model(&self, path: &Path) -> Result<()> {
        debug!("Loading voice model {}", path.display());
        let c_path = path_to_cstring(path)?;

        let mut model: *mut VoiceModelFile = ptr::null_mut();
        let code = unsafe { (self.api.voice_model_file_open)(c_path.as_ptr(), &mut model) };
        if code != RESULT_OK {
            return Err(VvspeakError::EngineInit(format!(
                "Failed to open voice model {}: {}",
                path.display(),
                self.api.message(code)
            )));
        }

        let code = unsafe { (self.api.synthesizer_load_voice_model)(self.synthesizer, model) };
        unsafe { (self.api.voice_model_file_delete)(model) };

        if code != RESULT_OK {
            return Err(VvspeakError::EngineInit(format!(
                "Failed to load voice model {}: {}",
                path.display(),
                self.api.message(code)
            )));
        }
        Ok(())
    }
}

impl SynthesisEngine for VoicevoxEngine {
    fn tts(&mut self, text: &str, style_id: StyleId) -> Result<Vec<u8>> {
        let c_text = CString::new(text)
            .map_err(|_| VvspeakError::Other("Text contains a NUL character".to_string()))?;

        let mut wav_len: usize = 0;
        let mut wav: *mut u8 = ptr::null_mut();
        let code = unsafe {
            (self.api.synthesizer_tts)(
                self.synthesizer,
                c_text.as_ptr(),
                style_id,
                self.tts_options,
                &mut wav_len,
                &mut wav,
            )
        };
        if code != RESULT_OK {
            return Err(VvspeakError::Other(self.api.message(code)));
        }
        if wav.is_null() {
            return Err(VvspeakError::Other("Engine returned no audio".to_string()));
        }

        let bytes = unsafe { std::slice::from_raw_parts(wav, wav_len) }.to_vec();
        unsafe { (self.api.wav_free)(wav) };

        debug!("Synthesized {} bytes of WAV", bytes.len());
        Ok(bytes)
    }
}

impl Drop for VoicevoxEngine {
    fn drop(&mut self) {
        debug!("Releasing VOICEVOX synthesizer");
        unsafe {
            (self.api.synthesizer_delete)(self.synthesizer);
            (self.api.open_jtalk_rc_delete)(self.open_jtalk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_acceleration_parse() {
        assert_eq!("auto".parse::<Acceleration>().unwrap(), Acceleration::Auto);
        assert_eq!(" CPU ".parse::<Acceleration>().unwrap(), Acceleration::Cpu);
        assert_eq!("gpu".parse::<Acceleration>().unwrap(), Acceleration::Gpu);
        assert!(matches!(
            "tpu".parse::<Acceleration>(),
            Err(VvspeakError::Config(_))
        ));
    }

    #[test]
    fn test_acceleration_raw_values() {
        assert_eq!(Acceleration::Auto.as_raw(), 0);
        assert_eq!(Acceleration::Cpu.as_raw(), 1);
        assert_eq!(Acceleration::Gpu.as_raw(), 2);
    }

    #[test]
    fn test_non_library_is_engine_init_error() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("libvoicevox_core.so");
        std::fs::write(&fake, b"not a shared object").unwrap();

        let assets = EngineAssets {
            runtime_library: PathBuf::from("/nonexistent/onnxruntime"),
            dictionary_dir: PathBuf::from("/nonexistent/dict"),
            voice_model: PathBuf::from("/nonexistent/0.vvm"),
            core_library: fake,
        };

        match VoicevoxEngine::new(&assets, EngineOptions::default()) {
            Err(VvspeakError::EngineInit(msg)) => assert!(msg.contains("Failed to load")),
            Err(e) => panic!("expected EngineInit, got {}", e),
            Ok(_) => panic!("loading a text file as a library should fail"),
        }
    }
}
