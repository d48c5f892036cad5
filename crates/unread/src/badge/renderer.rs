//! Converts aggregate counts into icon and badge updates

use log::debug;
use std::sync::{Arc, Mutex};

use super::icon::IconBitmap;
use crate::models::BadgeTotals;

/// Badge background color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl BadgeColor {
    /// Mentions waiting (#dd0000)
    pub const ALERT: BadgeColor = BadgeColor::rgb(0xdd, 0x00, 0x00);
    /// Only plain unread messages (#777777)
    pub const NEUTRAL: BadgeColor = BadgeColor::rgb(0x77, 0x77, 0x77);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// `#rrggbb` form
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// The icon/badge surface the host exposes
pub trait HostSurface: Send + Sync {
    fn set_icon(&self, icon: &IconBitmap);
    /// Empty text clears the badge
    fn set_badge_text(&self, text: &str);
    fn set_badge_color(&self, color: BadgeColor);
}

/// What the badge should show for a given set of totals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeView {
    pub text: String,
    /// `None` leaves the current color alone (badge is cleared anyway)
    pub color: Option<BadgeColor>,
    pub desaturated: bool,
}

impl BadgeView {
    /// Mentions win over unread; nothing at all clears the badge
    pub fn from_totals(totals: BadgeTotals) -> Self {
        let desaturated = totals.is_idle();
        if totals.mentions > 0 {
            Self {
                text: totals.mentions.to_string(),
                color: Some(BadgeColor::ALERT),
                desaturated,
            }
        } else if totals.unread > 0 {
            Self {
                text: totals.unread.to_string(),
                color: Some(BadgeColor::NEUTRAL),
                desaturated,
            }
        } else {
            Self {
                text: String::new(),
                color: None,
                desaturated,
            }
        }
    }
}

/// Sole writer of the host's icon and badge
pub struct BadgeRenderer {
    surface: Arc<dyn HostSurface>,
    last: Mutex<Option<BadgeView>>,
}

impl BadgeRenderer {
    pub fn new(surface: Arc<dyn HostSurface>) -> Self {
        Self {
            surface,
            last: Mutex::new(None),
        }
    }

    /// Push `totals` to the host.
    ///
    /// The icon is only updated when one is available; the badge text is
    /// always updated.
    pub fn render(&self, totals: BadgeTotals, icon: Option<&IconBitmap>) -> BadgeView {
        let view = BadgeView::from_totals(totals);

        if let Some(icon) = icon {
            if view.desaturated {
                self.surface.set_icon(&icon.desaturated());
            } else {
                self.surface.set_icon(icon);
            }
        }

        self.surface.set_badge_text(&view.text);
        if let Some(color) = view.color {
            self.surface.set_badge_color(color);
        }

        debug!(
            "Rendered badge {:?} (unread={}, mentions={})",
            view.text, totals.unread, totals.mentions
        );
        if let Ok(mut last) = self.last.lock() {
            *last = Some(view.clone());
        }
        view
    }

    /// The most recently rendered view
    pub fn last_view(&self) -> Option<BadgeView> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSurface {
        icons: Mutex<Vec<IconBitmap>>,
        texts: Mutex<Vec<String>>,
        colors: Mutex<Vec<BadgeColor>>,
    }

    impl HostSurface for RecordingSurface {
        fn set_icon(&self, icon: &IconBitmap) {
            self.icons.lock().unwrap().push(icon.clone());
        }

        fn set_badge_text(&self, text: &str) {
            self.texts.lock().unwrap().push(text.to_string());
        }

        fn set_badge_color(&self, color: BadgeColor) {
            self.colors.lock().unwrap().push(color);
        }
    }

    fn colored_icon() -> IconBitmap {
        IconBitmap::from_rgba(1, 1, vec![200, 10, 20, 128]).unwrap()
    }

    #[test]
    fn test_view_priority() {
        assert_eq!(
            BadgeView::from_totals(BadgeTotals::new(3, 0)),
            BadgeView {
                text: "3".into(),
                color: Some(BadgeColor::NEUTRAL),
                desaturated: false,
            }
        );
        assert_eq!(
            BadgeView::from_totals(BadgeTotals::new(3, 1)),
            BadgeView {
                text: "1".into(),
                color: Some(BadgeColor::ALERT),
                desaturated: false,
            }
        );
        assert_eq!(
            BadgeView::from_totals(BadgeTotals::new(0, 0)),
            BadgeView {
                text: String::new(),
                color: None,
                desaturated: true,
            }
        );
    }

    #[test]
    fn test_render_idle_clears_and_grays() {
        let surface = Arc::new(RecordingSurface::default());
        let renderer = BadgeRenderer::new(surface.clone());

        renderer.render(BadgeTotals::default(), Some(&colored_icon()));

        assert_eq!(*surface.texts.lock().unwrap(), vec![String::new()]);
        assert!(surface.colors.lock().unwrap().is_empty());
        let icons = surface.icons.lock().unwrap();
        assert_eq!(icons[0].rgba, vec![76, 76, 76, 128]);
    }

    #[test]
    fn test_render_mentions_in_alert_color() {
        let surface = Arc::new(RecordingSurface::default());
        let renderer = BadgeRenderer::new(surface.clone());

        let view = renderer.render(BadgeTotals::new(3, 1), Some(&colored_icon()));

        assert_eq!(view.text, "1");
        assert_eq!(*surface.colors.lock().unwrap(), vec![BadgeColor::ALERT]);
        assert_eq!(surface.icons.lock().unwrap()[0], colored_icon());
        assert_eq!(renderer.last_view(), Some(view));
    }

    #[test]
    fn test_render_without_icon_still_sets_badge() {
        let surface = Arc::new(RecordingSurface::default());
        let renderer = BadgeRenderer::new(surface.clone());

        renderer.render(BadgeTotals::new(12, 0), None);

        assert!(surface.icons.lock().unwrap().is_empty());
        assert_eq!(*surface.texts.lock().unwrap(), vec!["12".to_string()]);
        assert_eq!(*surface.colors.lock().unwrap(), vec![BadgeColor::NEUTRAL]);
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(BadgeColor::ALERT.to_hex(), "#dd0000");
        assert_eq!(BadgeColor::NEUTRAL.to_hex(), "#777777");
    }
}
