pub use structures::TRANSPARENT_PIXEL;

/// Placemap byte marking a position users may currently set.
pub const PLACEABLE: u8 = 0;
/// Fill byte for placeability reads outside the canvas.
pub const UNPLACEABLE: u8 = 1;

pub const SECOND_MS: i64 = 1000;
pub const MINUTE_MS: i64 = 60 * SECOND_MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Width of one activity bucket.
pub const BUCKET_MS: i64 = MINUTE_MS;
/// Span of retained activity history.
pub const WINDOW_MS: i64 = 7 * DAY_MS;

/// Template authoring tools stash a scale marker in the first
/// sub-pixel; alphas below this are treated as such a marker.
pub const SCALE_MARKER_MAX_ALPHA: u8 = 64;
