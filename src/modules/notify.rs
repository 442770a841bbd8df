use std::collections::HashMap;

use zbus::blocking::Connection;
use zbus::dbus_proxy;
use zvariant::{Structure, Value};

use super::glyph::{Glyph, Raster};
use super::render::DisplaySink;
use crate::error::Result;

const APP_NAME: &str = "netindicator";

#[dbus_proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// 返回通知 id；replaces_id 非 0 时原地替换已有通知
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;
}

/// 通知服务中本程序用到的两个调用
pub trait NotificationServer {
    fn notify(
        &self,
        replaces_id: u32,
        summary: &str,
        hints: HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close(&self, id: u32) -> zbus::Result<()>;
}

impl NotificationServer for NotificationsProxyBlocking<'_> {
    fn notify(
        &self,
        replaces_id: u32,
        summary: &str,
        hints: HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32> {
        NotificationsProxyBlocking::notify(
            self,
            APP_NAME,
            replaces_id,
            "",
            summary,
            "",
            &[],
            hints,
            expire_timeout,
        )
    }

    fn close(&self, id: u32) -> zbus::Result<()> {
        self.close_notification(id)
    }
}

/// freedesktop 桌面通知：常驻、不过期，原地替换同一条通知
pub struct NotificationSink<P = NotificationsProxyBlocking<'static>> {
    server: P,
    id: u32,
}

impl NotificationSink {
    pub fn connect() -> Result<Self> {
        let connection = Connection::session()?;
        let proxy = NotificationsProxyBlocking::new(&connection)?;
        Ok(Self::with_server(proxy))
    }
}

impl<P: NotificationServer> NotificationSink<P> {
    pub fn with_server(server: P) -> Self {
        Self { server, id: 0 }
    }

    pub fn server(&self) -> &P {
        &self.server
    }
}

/// image-data 提示：(iiibiiay) 宽、高、行跨度、含 alpha、位深、通道数、像素
fn image_data(raster: &Raster) -> Value<'static> {
    let size = raster.size() as i32;
    Value::Structure(Structure::from((
        size,
        size,
        raster.rowstride() as i32,
        true,
        8i32,
        4i32,
        raster.pixels().to_vec(),
    )))
}

impl<P: NotificationServer> DisplaySink for NotificationSink<P> {
    fn show(&mut self, title: &str, glyph: &Glyph, ongoing: bool) -> Result<()> {
        let resident = Value::from(ongoing);
        // 0 = low，不打扰
        let urgency = Value::from(0u8);
        let image = image_data(glyph.raster());

        let mut hints = HashMap::new();
        hints.insert("resident", &resident);
        hints.insert("urgency", &urgency);
        hints.insert("image-data", &image);

        let expire_timeout = if ongoing { 0 } else { -1 };
        self.id = self.server.notify(self.id, title, hints, expire_timeout)?;
        Ok(())
    }

    fn dismiss(&mut self) -> Result<()> {
        if self.id != 0 {
            let id = std::mem::replace(&mut self.id, 0);
            self.server.close(id)?;
        }
        Ok(())
    }
}
