mod common;

use common::{SliceWriter, disc_image};
use dicom_window::{BackendMode, DatasetDecoder, MedicalPreset, WindowSettings, WindowingEngine};

#[test]
fn disc_maps_to_full_contrast() {
    let pixels = disc_image();
    let bytes = SliceWriter::ct_slice(512, 512, 0.0, &pixels).to_bytes();
    let decoder = DatasetDecoder::from_bytes(&bytes).unwrap();
    let decoded = decoder.pixels_16().unwrap().unwrap();
    assert_eq!(decoded, pixels);

    let engine = WindowingEngine::new();
    let display = engine.apply_window_level(&decoded, 1000.0, 2000.0, BackendMode::Auto);
    assert_eq!(display.len(), 512 * 512);
    assert_eq!(display[256 * 512 + 256], 255);
    assert_eq!(display[0], 0);
    assert!(display.iter().all(|&v| v == 0 || v == 255));
}

#[test]
fn pipeline_is_deterministic() {
    let bytes = SliceWriter::ct_slice(512, 512, 0.0, &disc_image()).to_bytes();
    let first = DatasetDecoder::from_bytes(&bytes).unwrap();
    let second = DatasetDecoder::from_bytes(&bytes).unwrap();
    assert_eq!(first.dataset(), second.dataset());

    let engine = WindowingEngine::new();
    let a = engine.apply_window_level(&first.pixels_16().unwrap().unwrap(), 40.0, 400.0, BackendMode::Cpu);
    let b = engine.apply_window_level(&second.pixels_16().unwrap().unwrap(), 40.0, 400.0, BackendMode::Cpu);
    assert_eq!(a, b);

    let m1 = WindowingEngine::calculate_quality_metrics(&first.pixels_16().unwrap().unwrap());
    let m2 = WindowingEngine::calculate_quality_metrics(&second.pixels_16().unwrap().unwrap());
    assert_eq!(m1, m2);
}

#[test]
fn optimal_window_spans_the_disc() {
    let window = WindowingEngine::calculate_optimal_window_level(&disc_image());
    assert_eq!(window, WindowSettings::new(1000.0, 2000.0));
}

#[test]
fn head_ct_suggests_brain_first() {
    let bytes = SliceWriter::ct_slice(2, 2, 0.0, &[0; 4]).to_bytes();
    let decoder = DatasetDecoder::from_bytes(&bytes).unwrap();
    let presets = WindowingEngine::suggest_presets(&decoder.modality(), &decoder.body_part());
    assert_eq!(presets.first(), Some(&MedicalPreset::Brain));
}
