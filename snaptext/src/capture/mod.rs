//! Image acquisition.
//!
//! Camera capture and gallery selection both end in the same event: an
//! [`ImageHandle`](crate::models::ImageHandle) becomes available, or the user
//! cancelled. The camera path is additionally gated on a permission prompt.

mod source;

pub use source::{
    picker_channel, CameraPermission, ChannelImageSource, ImageSource, PermissionStatus,
    PickerEvent, PickerHandle, StaticPermission,
};
