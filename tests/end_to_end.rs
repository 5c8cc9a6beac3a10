use std::io::Cursor;

use approx::assert_relative_eq;
use topo_maps::config::TerrainConfig;
use topo_maps::pipeline::{run, RunOutcome, TerrainOutputs};
use topo_maps::progress::{CancelToken, NullObserver};
use topo_maps::rendering::{composite, ColourRamp, CompositeStyle, IndexKind, Layer, LayerStack, TerrainIndices};
use topo_maps::structures::{Connectivity, KernelSpec};
use topo_maps::tools::image_analysis::{GaussianFilter, OutlierClip, Resample, ResampleMethod, TargetResolution};
use topo_maps::tools::terrain_analysis::{
    Hillshade, LightCombination, LightSource, Lighting, Slope, Tpi, TpiMode, Tri,
};
use topo_maps::tools::TopoTool;
use topo_raster::{parse_arcascii, write_arcascii_to, Grid};

fn completed(outcome: RunOutcome) -> TerrainOutputs {
    match outcome {
        RunOutcome::Completed(outputs) => outputs,
        RunOutcome::Cancelled => panic!("run was cancelled"),
    }
}

/// A tilted, bumpy surface with a nodata hole.
fn rough_dem(rows: usize, columns: usize) -> Grid {
    let data: Vec<Vec<f64>> = (0..rows)
        .map(|r| {
            (0..columns)
                .map(|c| {
                    if r == 3 && c == 4 {
                        -9999.0
                    } else {
                        let (x, y) = (c as f64, r as f64);
                        100.0 + 2.0 * x - y + 3.0 * (x * 0.7).sin() * (y * 0.5).cos()
                    }
                })
                .collect()
        })
        .collect();
    Grid::from_rows(&data, 1.0, -9999.0).unwrap()
}

#[test]
fn flat_grid_has_zero_indices() {
    let flat = Grid::filled(5, 5, 1.0, 100.0, -9999.0).unwrap();
    let cancel = CancelToken::new();
    let slope = Slope::default().run(&flat, &cancel).unwrap();
    let tpi = Tpi {
        mode: TpiMode::Single(KernelSpec::Adjacent {
            connectivity: Connectivity::Eight,
        }),
    }
    .run(&flat, &cancel)
    .unwrap();
    let tri = Tri::default().run(&flat, &cancel).unwrap();
    for grid in [&slope, &tpi, &tri] {
        assert_eq!(grid.num_valid_cells(), 25);
        assert!(grid.values().iter().all(|&v| v == 0.0));
    }
}

#[test]
fn isolated_peak_tpi() {
    let peak = Grid::from_rows(
        &[vec![1.0, 1.0, 1.0], vec![1.0, 5.0, 1.0], vec![1.0, 1.0, 1.0]],
        1.0,
        -9999.0,
    )
    .unwrap();
    let tpi = Tpi::default().run(&peak, &CancelToken::new()).unwrap();
    assert_relative_eq!(tpi.get_value(1, 1), 4.0, epsilon = 1e-12);
}

#[test]
fn resample_by_factor_two() {
    let dem = Grid::filled(10, 10, 1.0, 50.0, -9999.0).unwrap();
    for method in [
        ResampleMethod::NearestNeighbour,
        ResampleMethod::Bilinear,
        ResampleMethod::Cubic,
        ResampleMethod::CubicSpline,
    ] {
        let out = Resample {
            target: TargetResolution::Factor(2),
            method,
        }
        .run(&dem, &CancelToken::new())
        .unwrap();
        assert_eq!((out.configs.rows, out.configs.columns), (5, 5));
        assert_relative_eq!(out.cell_size(), 2.0);
        assert_eq!(out.configs.north, dem.configs.north);
        assert_eq!(out.configs.west, dem.configs.west);
        for &v in out.values() {
            assert_relative_eq!(v, 50.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn identity_resampling_is_a_no_op() {
    let dem = rough_dem(8, 9);
    let cancel = CancelToken::new();
    let by_factor = Resample {
        target: TargetResolution::Factor(1),
        method: ResampleMethod::Cubic,
    }
    .run(&dem, &cancel)
    .unwrap();
    let by_size = Resample {
        target: TargetResolution::Absolute(1.0),
        method: ResampleMethod::Bilinear,
    }
    .run(&dem, &cancel)
    .unwrap();
    assert_eq!(by_factor, dem);
    assert_eq!(by_size, dem);
}

#[test]
fn tri_is_never_negative() {
    let dem = rough_dem(12, 12);
    let kernels = [
        KernelSpec::default(),
        KernelSpec::Gaussian {
            radius: topo_maps::structures::KernelRadius::Cells(2),
            sigma: 1.0,
        },
    ];
    for kernel in kernels {
        let tri = Tri { kernel }.run(&dem, &CancelToken::new()).unwrap();
        assert!(tri.valid_values().iter().all(|&v| v >= 0.0));
        assert_eq!(tri.get(3, 4), None);
    }
}

#[test]
fn one_light_matches_single_lighting() {
    let dem = rough_dem(10, 10);
    let light = LightSource {
        azimuth: 300.0,
        altitude: 35.0,
    };
    let single = Hillshade {
        lighting: Lighting::Single(light),
        ..Hillshade::default()
    };
    let multiple = Hillshade {
        lighting: Lighting::Multiple {
            lights: vec![light],
            combine: LightCombination::Mean,
        },
        ..Hillshade::default()
    };
    let cancel = CancelToken::new();
    let a = single.run(&dem, &cancel).unwrap();
    let b = multiple.run(&dem, &cancel).unwrap();
    for (x, y) in a.values().iter().zip(b.values()) {
        assert_relative_eq!(*x, *y, epsilon = 1e-9);
    }
}

#[test]
fn clip_then_smooth_properties() {
    let mut dem = rough_dem(10, 10);
    dem.set_value(7, 7, 10_000.0);
    dem.update_min_max();
    let cancel = CancelToken::new();
    let clip = OutlierClip::default();
    let (lo, hi) = clip.fences(&dem).unwrap();
    let once = clip.run(&dem, &cancel).unwrap();
    assert!(once.valid_values().iter().all(|&v| v >= lo && v <= hi));
    assert_eq!(clip.run(&once, &cancel).unwrap(), once);
    assert_eq!(GaussianFilter { sigma: 0.0 }.run(&once, &cancel).unwrap(), once);
}

#[test]
fn opaque_top_layer_is_reproduced() {
    let dem = rough_dem(6, 6);
    let cancel = CancelToken::new();
    let mut indices = TerrainIndices::new(dem.clone());
    indices.set(IndexKind::Hillshade, Hillshade::default().run(&dem, &cancel).unwrap());
    let ramp = ColourRamp::from_colours(&[[0, 0, 255, 255], [255, 255, 0, 255]]).unwrap();
    let mut top = Layer::new(IndexKind::Elevation, ramp);
    top.stretch = true;
    let style = CompositeStyle::Relief {
        layers: LayerStack::Custom(vec![
            Layer::new(IndexKind::Hillshade, ColourRamp::grayscale()),
            top.clone(),
        ]),
        contrast: None,
        sharpen: None,
        edges: None,
    };
    let with_base = composite(&indices, &style).unwrap();
    let alone = composite(&indices, &CompositeStyle::SingleIndex { layer: top }).unwrap();
    for row in 0..6 {
        for col in 0..6 {
            if dem.get(row, col).is_some() {
                assert_eq!(with_base.get_pixel(row, col), alone.get_pixel(row, col));
            }
        }
    }
}

#[test]
fn ascii_grid_through_the_whole_run() {
    let mut text = Vec::new();
    write_arcascii_to(&rough_dem(16, 20), &mut text).unwrap();
    let dem = parse_arcascii(Cursor::new(text)).unwrap();
    assert_eq!((dem.configs.rows, dem.configs.columns), (16, 20));

    let config = TerrainConfig::from_json(
        r#"{
            "resample": { "change": { "relative": 2 }, "method": "bilinear" },
            "slope": { "post": { "outlier_iqr": 1.5 } },
            "tpi": { "export": true },
            "tri": { "post": { "gaussian_sigma": 1.0 } },
            "hillshade": { "combined": true, "export": true },
            "composite": { "style": "relief", "layers": "vintage", "contrast": 1.1,
                           "sharpen": { "radius": 1.0, "percent": 50.0, "threshold": 2.0 },
                           "edges": { "sigma": 1.0, "colour": [40, 20, 10] } }
        }"#,
    )
    .unwrap();
    let outputs = completed(run(&config, &dem, &NullObserver, &CancelToken::new()).unwrap());
    assert_eq!((outputs.elevation.configs.rows, outputs.elevation.configs.columns), (8, 10));
    let kinds: Vec<IndexKind> = outputs.exports.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, vec![IndexKind::Tpi, IndexKind::Hillshade]);
    for (_, grid) in &outputs.exports {
        assert!(grid.same_dimensions(&outputs.elevation));
        assert_eq!(grid.configs.north, outputs.elevation.configs.north);
    }
    let image = outputs.composite.unwrap();
    assert_eq!((image.width(), image.height()), (10, 8));
    assert_eq!(image.as_bytes().len(), 10 * 8 * 4);
    assert!(image.pixels().iter().any(|p| p[3] == 255));
}

#[test]
fn preview_window_limits_the_run() {
    let config = TerrainConfig::from_json(
        r#"{ "preview": { "max_rows": 4, "max_columns": 5 }, "slope": { "export": true } }"#,
    )
    .unwrap();
    let outputs = completed(run(&config, &rough_dem(12, 12), &NullObserver, &CancelToken::new()).unwrap());
    let slope = outputs.export(IndexKind::Slope).unwrap();
    assert_eq!((slope.configs.rows, slope.configs.columns), (4, 5));
}

#[test]
fn cancellation_yields_no_outputs() {
    let config = TerrainConfig::from_json(r#"{ "tri": {}, "composite": { "style": "original" } }"#).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = run(&config, &rough_dem(6, 6), &NullObserver, &cancel).unwrap();
    assert!(outcome.is_cancelled());
}
