use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

use crate::error::{Result, SnapError};
use crate::models::{Acquisition, ImageHandle};

/// Camera and gallery acquisition behind one contract.
///
/// Both calls suspend until the user acts. Cancelling a picker resolves with
/// [`Acquisition::Cancelled`]; it is not a failure.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn request_from_gallery(&self) -> Result<Acquisition>;
    async fn request_from_camera(&self) -> Result<Acquisition>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[async_trait]
pub trait CameraPermission: Send + Sync {
    async fn request_camera_permission(&self) -> PermissionStatus;
}

/// Answers the permission prompt from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    granted: bool,
}

impl StaticPermission {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

#[async_trait]
impl CameraPermission for StaticPermission {
    async fn request_camera_permission(&self) -> PermissionStatus {
        if self.granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}

/// What the user did with an open picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    Picked(ImageHandle),
    Cancelled,
}

impl From<PickerEvent> for Acquisition {
    fn from(event: PickerEvent) -> Self {
        match event {
            PickerEvent::Picked(handle) => Acquisition::Image(handle),
            PickerEvent::Cancelled => Acquisition::Cancelled,
        }
    }
}

/// One picker's single open request.
///
/// A request registers a oneshot that the view layer completes. Answers given
/// while no request is open are refused, so a stale shutter can never satisfy
/// a later request.
struct PickerSlot {
    picker: &'static str,
    waiting: Mutex<Option<oneshot::Sender<PickerEvent>>>,
    open: watch::Sender<bool>,
    closed: AtomicBool,
}

impl PickerSlot {
    fn new(picker: &'static str) -> Self {
        let (open, _) = watch::channel(false);
        Self {
            picker,
            waiting: Mutex::new(None),
            open,
            closed: AtomicBool::new(false),
        }
    }

    fn waiting(&self) -> MutexGuard<'_, Option<oneshot::Sender<PickerEvent>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request(&self) -> Result<Acquisition> {
        let rx = {
            let mut waiting = self.waiting();
            if self.closed.load(Ordering::SeqCst) {
                info!(picker = self.picker, "Picker closed without a selection");
                return Err(SnapError::Cancelled);
            }
            let (tx, rx) = oneshot::channel();
            if waiting.replace(tx).is_some() {
                debug!(picker = self.picker, "Replaced an abandoned request");
            }
            self.open.send_replace(true);
            rx
        };

        match rx.await {
            Ok(event) => {
                debug!(picker = self.picker, ?event, "Picker resolved");
                Ok(event.into())
            }
            Err(_) => {
                info!(picker = self.picker, "Picker closed without a selection");
                Err(SnapError::Cancelled)
            }
        }
    }

    fn answer(&self, event: PickerEvent) -> Result<()> {
        let mut waiting = self.waiting();
        let tx = waiting.take();
        self.open.send_replace(false);

        match tx {
            Some(tx) => tx.send(event).map_err(|event| {
                debug!(picker = self.picker, ?event, "Request was abandoned");
                SnapError::NotRequested(self.picker)
            }),
            None => {
                debug!(picker = self.picker, ?event, "No request to answer");
                Err(SnapError::NotRequested(self.picker))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.waiting().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    async fn requested(&self) {
        let mut open = self.open.subscribe();
        loop {
            if open.wait_for(|open| *open).await.is_err() {
                return;
            }
            {
                let waiting = self.waiting();
                if waiting.as_ref().is_some_and(|tx| !tx.is_closed()) {
                    return;
                }
                // The last request was abandoned; wait for a fresh one.
                self.open.send_replace(false);
            }
        }
    }

    fn close(&self) {
        let mut waiting = self.waiting();
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the sender resolves a pending request as cancelled.
        waiting.take();
        self.open.send_replace(false);
    }
}

/// Image source fed by the view layer through a [`PickerHandle`].
pub struct ChannelImageSource {
    gallery: Arc<PickerSlot>,
    camera: Arc<PickerSlot>,
}

/// Answering side of a [`ChannelImageSource`]: the gallery picker and the
/// camera shutter.
///
/// Each answer goes to the request that is open right now. With no open
/// request it fails with [`SnapError::NotRequested`].
#[derive(Clone)]
pub struct PickerHandle {
    slots: Arc<HandleSlots>,
}

struct HandleSlots {
    gallery: Arc<PickerSlot>,
    camera: Arc<PickerSlot>,
}

impl Drop for HandleSlots {
    fn drop(&mut self) {
        self.gallery.close();
        self.camera.close();
    }
}

pub fn picker_channel() -> (PickerHandle, ChannelImageSource) {
    let gallery = Arc::new(PickerSlot::new("gallery"));
    let camera = Arc::new(PickerSlot::new("camera"));

    (
        PickerHandle {
            slots: Arc::new(HandleSlots {
                gallery: gallery.clone(),
                camera: camera.clone(),
            }),
        },
        ChannelImageSource { gallery, camera },
    )
}

impl PickerHandle {
    pub fn pick(&self, image: impl Into<ImageHandle>) -> Result<()> {
        self.slots.gallery.answer(PickerEvent::Picked(image.into()))
    }

    pub fn cancel_gallery(&self) -> Result<()> {
        self.slots.gallery.answer(PickerEvent::Cancelled)
    }

    pub fn shutter(&self, image: impl Into<ImageHandle>) -> Result<()> {
        self.slots.camera.answer(PickerEvent::Picked(image.into()))
    }

    pub fn cancel_camera(&self) -> Result<()> {
        self.slots.camera.answer(PickerEvent::Cancelled)
    }

    pub fn is_gallery_open(&self) -> bool {
        self.slots.gallery.is_open()
    }

    pub fn is_camera_open(&self) -> bool {
        self.slots.camera.is_open()
    }

    /// Resolves once a gallery request is waiting for an answer.
    pub async fn gallery_requested(&self) {
        self.slots.gallery.requested().await
    }

    /// Resolves once a camera request is waiting for an answer.
    pub async fn camera_requested(&self) {
        self.slots.camera.requested().await
    }
}

#[async_trait]
impl ImageSource for ChannelImageSource {
    async fn request_from_gallery(&self) -> Result<Acquisition> {
        self.gallery.request().await
    }

    async fn request_from_camera(&self) -> Result<Acquisition> {
        self.camera.request().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn answer_gallery(
        picker: &PickerHandle,
        source: &ChannelImageSource,
        answer: impl FnOnce(&PickerHandle) -> Result<()>,
    ) -> Result<Acquisition> {
        let (acquired, answered) = tokio::join!(source.request_from_gallery(), async {
            picker.gallery_requested().await;
            answer(picker)
        });
        answered?;
        acquired
    }

    #[tokio::test]
    async fn test_gallery_pick_resolves_with_handle() {
        let (picker, source) = picker_channel();

        let acquired = answer_gallery(&picker, &source, |p| p.pick("/photos/menu.jpg"))
            .await
            .unwrap();
        assert_eq!(acquired, Acquisition::Image(ImageHandle::from("/photos/menu.jpg")));
        assert!(!picker.is_gallery_open());
    }

    #[tokio::test]
    async fn test_camera_cancel_is_not_an_error() {
        let (picker, source) = picker_channel();

        let (acquired, _) = tokio::join!(source.request_from_camera(), async {
            picker.camera_requested().await;
            picker.cancel_camera().unwrap();
        });
        assert_eq!(acquired.unwrap(), Acquisition::Cancelled);
    }

    #[tokio::test]
    async fn test_answer_without_request_is_refused() {
        let (picker, _source) = picker_channel();

        assert!(matches!(
            picker.shutter("/camera/early.jpg"),
            Err(SnapError::NotRequested("camera"))
        ));
        assert!(matches!(
            picker.cancel_gallery(),
            Err(SnapError::NotRequested("gallery"))
        ));
    }

    #[tokio::test]
    async fn test_second_shutter_does_not_carry_over() {
        let (picker, source) = picker_channel();

        let (first, second) = tokio::join!(source.request_from_camera(), async {
            picker.camera_requested().await;
            picker.shutter("/camera/first.jpg").unwrap();
            picker.shutter("/camera/second.jpg")
        });
        assert_eq!(first.unwrap(), Acquisition::Image(ImageHandle::from("/camera/first.jpg")));
        assert!(matches!(second, Err(SnapError::NotRequested("camera"))));

        // The next request still waits for its own shutter.
        let mut next = tokio_test::task::spawn(source.request_from_camera());
        tokio_test::assert_pending!(next.poll());
        assert!(picker.is_camera_open());
        picker.shutter("/camera/third.jpg").unwrap();
        let acquired = tokio_test::assert_ready!(next.poll()).unwrap();
        assert_eq!(acquired, Acquisition::Image(ImageHandle::from("/camera/third.jpg")));
    }

    #[tokio::test]
    async fn test_pickers_are_independent() {
        let (picker, source) = picker_channel();

        let mut camera = tokio_test::task::spawn(source.request_from_camera());
        tokio_test::assert_pending!(camera.poll());
        assert!(picker.is_camera_open());
        assert!(!picker.is_gallery_open());
        assert!(picker.pick("/gallery/1.jpg").is_err());

        picker.shutter("/camera/1.jpg").unwrap();
        let from_camera = tokio_test::assert_ready!(camera.poll()).unwrap();
        assert_eq!(from_camera, Acquisition::Image(ImageHandle::from("/camera/1.jpg")));
    }

    #[tokio::test]
    async fn test_abandoned_request_refuses_answers() {
        let (picker, source) = picker_channel();

        let mut gallery = tokio_test::task::spawn(source.request_from_gallery());
        tokio_test::assert_pending!(gallery.poll());
        drop(gallery);

        assert!(!picker.is_gallery_open());
        assert!(matches!(
            picker.pick("/gallery/late.jpg"),
            Err(SnapError::NotRequested("gallery"))
        ));
    }

    #[tokio::test]
    async fn test_dropped_handle_resolves_as_cancelled() {
        let (picker, source) = picker_channel();

        let mut pending = tokio_test::task::spawn(source.request_from_camera());
        tokio_test::assert_pending!(pending.poll());
        drop(picker);
        assert!(matches!(
            tokio_test::assert_ready!(pending.poll()),
            Err(SnapError::Cancelled)
        ));

        let result = source.request_from_gallery().await;
        assert!(matches!(result, Err(SnapError::Cancelled)));
    }

    #[tokio::test]
    async fn test_static_permission() {
        assert_eq!(
            StaticPermission::new(true).request_camera_permission().await,
            PermissionStatus::Granted
        );
        assert_eq!(
            StaticPermission::new(false).request_camera_permission().await,
            PermissionStatus::Denied
        );
    }
}
