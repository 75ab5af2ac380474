//! Synthetic PAR/REC acquisitions for the integration tests.

#![allow(dead_code)]

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

/// Dimension values shared by every slice of one volume.
#[derive(Debug, Clone, Copy)]
pub struct VolumeDef {
    pub echo: i64,
    pub phase: i64,
    pub image_type: i64,
    pub dynamic: i64,
    pub label: i64,
    pub b_value_number: i64,
    pub gradient_orientation: i64,
    pub b_factor: f64,
    /// Gradient direction as (ap, fh, rl)
    pub direction: [f64; 3],
}

impl Default for VolumeDef {
    fn default() -> Self {
        Self {
            echo: 1,
            phase: 1,
            image_type: 0,
            dynamic: 1,
            label: 1,
            b_value_number: 1,
            gradient_orientation: 1,
            b_factor: 0.0,
            direction: [0.0; 3],
        }
    }
}

/// A V4.2 acquisition of 16-bit images with unit scaling, so stored and
/// floating point values coincide.
#[derive(Debug, Clone)]
pub struct Scan {
    pub width: usize,
    pub height: usize,
    pub slices: usize,
    pub diffusion: bool,
    pub volumes: Vec<VolumeDef>,
}

impl Scan {
    pub fn new(volumes: Vec<VolumeDef>) -> Self {
        Self {
            width: 3,
            height: 2,
            slices: 2,
            diffusion: false,
            volumes,
        }
    }

    /// Value of every pixel of slice `slice` (1-based) of volume `volume`
    pub fn pixel(volume: usize, slice: usize) -> i16 {
        (volume * 10 + slice) as i16
    }

    /// Images are listed slice by slice, volumes innermost, like scanner exports
    fn images(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (1..=self.slices).flat_map(move |slice| (0..self.volumes.len()).map(move |v| (v, slice)))
    }

    pub fn par_text(&self) -> String {
        let mut text = String::from(
            "# === DATA DESCRIPTION FILE ===\n\
             # CLINICAL TRYOUT             Research image export tool     V4.2\n\
             # === GENERAL INFORMATION ===\n\
             .    Angulation midslice(ap,fh,rl)[degr]:   0.000  0.000  0.000\n\
             .    Off Centre midslice(ap,fh,rl) [mm] :   0.000  0.000  0.000\n",
        );
        let _ = writeln!(
            text,
            ".    Diffusion                          :   {}",
            u8::from(self.diffusion)
        );
        text.push_str("# === IMAGE INFORMATION ===\n");

        for (index, (volume, slice)) in self.images().enumerate() {
            let def = &self.volumes[volume];
            let [ap, fh, rl] = def.direction;
            let _ = writeln!(
                text,
                " {slice} {} {} {} {} 2 {index} 16 100 {} {} 0.0 1.0 1.0 100 200 \
                 0.00 0.00 0.00 0.00 0.00 0.00 3.000 0.000 0 1 0 2 2.000 2.000 \
                 10.0 0.0 0.0 {:.1} 1 90.0 0 0 0 1 0.0 {} {} 0 0 {ap:.3} {fh:.3} {rl:.3} {}",
                def.echo,
                def.dynamic,
                def.phase,
                def.image_type,
                self.width,
                self.height,
                def.b_factor,
                def.b_value_number,
                def.gradient_orientation,
                def.label,
            );
        }
        text.push_str("# === END OF DATA DESCRIPTION FILE ===\n");
        text
    }

    pub fn rec_bytes(&self) -> Vec<u8> {
        let pixels = self.width * self.height;
        self.images()
            .flat_map(|(volume, slice)| {
                std::iter::repeat_n(Self::pixel(volume, slice), pixels)
                    .flat_map(i16::to_le_bytes)
            })
            .collect()
    }

    /// Write `<name>.PAR` and `<name>.REC` into `dir`, returning the PAR path
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let par = dir.join(format!("{name}.PAR"));
        fs::write(&par, self.par_text()).unwrap();
        fs::write(dir.join(format!("{name}.REC")), self.rec_bytes()).unwrap();
        par
    }
}

/// Four echoes acquired at each of two cardiac phases, phase major
pub fn echo_phase_scan() -> Scan {
    let volumes = (1..=2)
        .flat_map(|phase| {
            (1..=4).map(move |echo| VolumeDef {
                echo,
                phase,
                ..VolumeDef::default()
            })
        })
        .collect();
    Scan::new(volumes)
}

/// One b=0 volume and three directions at b=1000
pub fn diffusion_scan() -> Scan {
    let weighted = |gradient_orientation, direction| VolumeDef {
        b_value_number: 2,
        gradient_orientation,
        b_factor: 1000.0,
        direction,
        ..VolumeDef::default()
    };
    let mut scan = Scan::new(vec![
        VolumeDef::default(),
        weighted(1, [1.0, 0.0, 0.0]),
        weighted(2, [0.0, 1.0, 0.0]),
        weighted(3, [0.0, 0.0, 1.0]),
    ]);
    scan.diffusion = true;
    scan
}
