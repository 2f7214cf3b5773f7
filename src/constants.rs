//! Provider and chart constants shared across the crate.

use crate::types::ParclId;

pub const DEFAULT_BASE_URL: &str = "https://api.realestate.parcllabs.com/v1";
pub const MARKETS_PATH: &str = "place/markets";

/// Environment variable holding the Parcl Labs API key.
pub const API_KEY_ENV: &str = "PARCL_LABS_API_KEY";
/// Lowercase spelling accepted when `API_KEY_ENV` is unset.
pub const API_KEY_ENV_FALLBACK: &str = "parcl_labs_api_key";

/// Token stripped from provider market names before they are used as labels
/// ("Springfield City" -> "Springfield"). Exact, case-sensitive match.
pub const NAME_NOISE_TOKEN: &str = "City";

pub const DEFAULT_CONFIG_PATH: &str = "housing_vol.toml";
pub const DEFAULT_ARTIFACT_PATH: &str = "index.html";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Markets charted when the config file does not override `selection`.
pub const DEFAULT_PARCL_IDS: &[ParclId] = &[
    5332726, // Cincinnati
    5332800, // Cleveland
    5328454, // New Orleans
    5377717, // Pittsburgh
    5307837, // Jersey City
    5308252, // Louisville
    5384169, // Atlanta
    5407714, // Boston
    5822447, // Brooklyn County
    5387853, // Chicago
    5306725, // Denver
    5377230, // Las Vegas
    5373892, // Los Angeles
    5352987, // Miami
    5353022, // Miami Beach
    5372594, // New York
    5378051, // Philadelphia
    5386820, // Phoenix
    5408016, // Portland
    5374321, // San Francisco
    5384705, // Seattle
    5503877, // Washington, DC
    5386838, // Scottsdale
    2900332, // San Diego
    2900398, // Steamboat Springs
    2900229, // Palm Bay, FL
    2899841, // Charlotte
    2900174, // Nashville
    5306666, // Colorado Springs
    5290547, // Raleigh
    5333209, // Milwaukee
];

// Chart layout
pub const CHART_TITLE: &str = "Annual Volatility by Housing Market";
pub const CHART_Y_LABEL: &str = "Annual Volatility";
pub const CHART_WIDTH: u32 = 1250;
pub const CHART_HEIGHT: u32 = 700;
pub const CHART_TICK_ANGLE: i32 = 45;

/// Qualitative 24-color palette (Plotly's "Dark24"); traces cycle through it.
pub const DARK24: [&str; 24] = [
    "#2E91E5", "#E15F99", "#1CA71C", "#FB0D0D", "#DA16FF", "#222A2A", "#B68100", "#750D86",
    "#EB663B", "#511CFB", "#00A08B", "#FB00D1", "#FC0080", "#B2828D", "#6C7C32", "#778AAE",
    "#862A16", "#A777F1", "#620042", "#1616A7", "#DA60CA", "#6C4516", "#0D2A63", "#AF0038",
];
