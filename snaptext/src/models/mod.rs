mod image;
mod recognition;
mod ui;

pub use self::image::*;
pub use self::recognition::*;
pub use self::ui::*;
