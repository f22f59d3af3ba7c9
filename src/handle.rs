//! Native handle lifecycle guard
//!
//! Every native handle the bridge keeps is wrapped in an [`Owned`] guard that
//! holds exactly one reference unit. The unit is given back either through
//! [`Owned::release`], which reports failures, or from `Drop`, which logs
//! them. Taking the unit out of the guard is what makes a double release
//! structurally impossible.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::native::{AttrHandle, LobHandle, NativeClient, NativeResult, ObjectHandle, TypeHandle};

/// A native handle kind with reference counting calls
pub(crate) trait HandleKind: Copy + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn add_ref(self, client: &dyn NativeClient) -> NativeResult<()>;
    fn release(self, client: &dyn NativeClient) -> NativeResult<()>;
}

impl HandleKind for TypeHandle {
    fn add_ref(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.type_add_ref(self)
    }

    fn release(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.type_release(self)
    }
}

impl HandleKind for AttrHandle {
    fn add_ref(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.attr_add_ref(self)
    }

    fn release(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.attr_release(self)
    }
}

impl HandleKind for ObjectHandle {
    fn add_ref(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.object_add_ref(self)
    }

    fn release(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.object_release(self)
    }
}

impl HandleKind for LobHandle {
    fn add_ref(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.lob_add_ref(self)
    }

    fn release(self, client: &dyn NativeClient) -> NativeResult<()> {
        client.lob_release(self)
    }
}

/// One reference unit on a native handle
pub(crate) struct Owned<H: HandleKind> {
    ctx: Arc<Context>,
    handle: Option<H>,
}

pub(crate) type TypeRef = Owned<TypeHandle>;
pub(crate) type AttrRef = Owned<AttrHandle>;
pub(crate) type ObjectRef = Owned<ObjectHandle>;
pub(crate) type LobRef = Owned<LobHandle>;

impl<H: HandleKind> Owned<H> {
    /// Take over a unit the native call already handed out
    pub(crate) fn adopt(ctx: &Arc<Context>, handle: H) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            handle: Some(handle),
        }
    }

    /// Add a reference and own it
    pub(crate) fn acquire(ctx: &Arc<Context>, handle: H) -> Result<Self> {
        handle
            .add_ref(ctx.client.as_ref())
            .map_err(|e| Error::native(format!("add_ref {}", handle), e))?;
        Ok(Self::adopt(ctx, handle))
    }

    /// The raw handle
    pub(crate) fn handle(&self) -> H {
        // only `release` and `drop` empty the slot, and both consume the guard
        match self.handle {
            Some(h) => h,
            None => unreachable!("handle guard used after release"),
        }
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub(crate) fn client(&self) -> &dyn NativeClient {
        self.ctx.client.as_ref()
    }

    /// A second unit on the same handle
    pub(crate) fn try_clone(&self) -> Result<Self> {
        Self::acquire(&self.ctx, self.handle())
    }

    /// Give the unit back, reporting failure
    pub(crate) fn release(mut self) -> Result<()> {
        match self.handle.take() {
            Some(h) => h
                .release(self.ctx.client.as_ref())
                .map_err(|e| Error::native(format!("release {}", h), e)),
            None => Ok(()),
        }
    }
}

impl<H: HandleKind> Drop for Owned<H> {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            if let Err(e) = h.release(self.ctx.client.as_ref()) {
                tracing::error!(handle = %h, error = %e, "failed to release native handle");
            }
        }
    }
}

impl<H: HandleKind> fmt::Debug for Owned<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle {
            Some(h) => write!(f, "Owned({})", h),
            None => f.write_str("Owned(released)"),
        }
    }
}
