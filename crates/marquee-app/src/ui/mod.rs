pub mod overlay;
pub mod player_view;
pub mod progress_bar;
pub mod theme;

pub use overlay::EguiOverlay;
pub use player_view::{PlayerAction, PlayerView};
