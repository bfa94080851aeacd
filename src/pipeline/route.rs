use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMethod {
    Single,
    Tiled,
}

impl ProcessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMethod::Single => "single",
            ProcessingMethod::Tiled => "tiled",
        }
    }
}

/// Pure routing decision: tile when either dimension exceeds the single
/// pass limit, or when the caller asks for tiling outright.
pub fn choose_method(
    width: u32,
    height: u32,
    force_tiling: bool,
    max_single_pass: u32,
) -> ProcessingMethod {
    if force_tiling || width > max_single_pass || height > max_single_pass {
        ProcessingMethod::Tiled
    } else {
        ProcessingMethod::Single
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_limit_runs_single_pass() {
        assert_eq!(
            choose_method(2048, 2048, false, 2048),
            ProcessingMethod::Single
        );
        assert_eq!(choose_method(640, 480, false, 2048), ProcessingMethod::Single);
    }

    #[test]
    fn over_limit_on_either_axis_tiles() {
        assert_eq!(choose_method(2049, 100, false, 2048), ProcessingMethod::Tiled);
        assert_eq!(choose_method(100, 2049, false, 2048), ProcessingMethod::Tiled);
    }

    #[test]
    fn force_flag_always_tiles() {
        assert_eq!(choose_method(100, 100, true, 2048), ProcessingMethod::Tiled);
    }
}
