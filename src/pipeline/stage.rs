use std::fmt;

/// The ten pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    LoadInputs,
    ReprojectClip,
    FillDepressions,
    FlowDirection,
    FlowAccumulation,
    ExtractStreams,
    DelineateBasins,
    BasinStatistics,
    RunModel,
    Export,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::LoadInputs,
        Stage::ReprojectClip,
        Stage::FillDepressions,
        Stage::FlowDirection,
        Stage::FlowAccumulation,
        Stage::ExtractStreams,
        Stage::DelineateBasins,
        Stage::BasinStatistics,
        Stage::RunModel,
        Stage::Export,
    ];

    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    /// Job progress reported on entering the stage
    pub fn progress(self) -> u8 {
        match self {
            Stage::LoadInputs => 5,
            Stage::ReprojectClip => 15,
            Stage::FillDepressions => 28,
            Stage::FlowDirection => 40,
            Stage::FlowAccumulation => 52,
            Stage::ExtractStreams => 62,
            Stage::DelineateBasins => 73,
            Stage::BasinStatistics => 82,
            Stage::RunModel => 91,
            Stage::Export => 95,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::LoadInputs => "load inputs",
            Stage::ReprojectClip => "reproject and clip",
            Stage::FillDepressions => "fill depressions",
            Stage::FlowDirection => "flow direction",
            Stage::FlowAccumulation => "flow accumulation",
            Stage::ExtractStreams => "stream extraction",
            Stage::DelineateBasins => "sub-basin delineation",
            Stage::BasinStatistics => "basin statistics",
            Stage::RunModel => "hazard model",
            Stage::Export => "export",
        }
    }

    pub fn message(self, zone: bool) -> &'static str {
        match (self, zone) {
            (Stage::LoadInputs, _) => "Loading fire perimeter, DEM, and dNBR rasters...",
            (Stage::ReprojectClip, false) => "Reprojecting to the projected working CRS and clipping the DEM...",
            (Stage::ReprojectClip, true) => "Reprojecting zone polygon to the projected working CRS...",
            (Stage::FillDepressions, _) => "Filling topographic depressions in DEM...",
            (Stage::FlowDirection, _) => "Computing D8 flow direction across terrain...",
            (Stage::FlowAccumulation, _) => "Computing flow accumulation (upslope contributing area)...",
            (Stage::ExtractStreams, _) => "Extracting stream network...",
            (Stage::DelineateBasins, _) => "Delineating sub-basins from stream network...",
            (Stage::BasinStatistics, _) => "Computing slope and burn severity for each sub-basin...",
            (Stage::RunModel, _) => "Running debris-flow likelihood and volume models...",
            (Stage::Export, false) => "Exporting GeoJSON results and fire perimeter...",
            (Stage::Export, true) => "Exporting zone analysis results...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {} ({})", self.number(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_and_progress_are_ordered() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.number() as usize, i + 1);
        }
        for pair in Stage::ALL.windows(2) {
            assert!(pair[1].progress() > pair[0].progress());
        }
        assert!(Stage::Export.progress() < 100);
    }

    #[test]
    fn test_display() {
        assert_eq!(Stage::FlowDirection.to_string(), "Stage 4 (flow direction)");
    }
}
