//! SDL2 window: event polling, texture upload, vsync-paced present.

use anyhow::{anyhow, Result};
use colorview_pump::Bitmap;
use sdl2::{
    event::Event,
    keyboard::Keycode,
    messagebox::{show_simple_message_box, MessageBoxFlag},
    pixels::PixelFormatEnum,
    render::{Canvas, Texture, TextureCreator},
    video::{Window as SdlWindow, WindowContext},
    EventPump, Sdl,
};

pub struct Window {
    _context: Sdl,
    title:    String,
    canvas:   Canvas<SdlWindow>,
    events:   EventPump,
}

impl Window {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
        let context = sdl2::init().map_err(|e| anyhow!("Failed to initialize SDL2: {}", e))?;
        let video = context.video().map_err(|e| anyhow!("Failed to get SDL2 video subsystem: {}", e))?;
        let window = video
            .window(title, width, height)
            .position_centered()
            .resizable()
            .build()
            .map_err(|e| anyhow!("Failed to build SDL2 window: {}", e))?;

        // present_vsync paces the render loop at the display refresh rate
        let canvas = window
            .into_canvas()
            .accelerated()
            .present_vsync()
            .build()
            .map_err(|e| anyhow!("Failed to build SDL2 canvas: {}", e))?;

        let events = context.event_pump().map_err(|e| anyhow!("Failed to get SDL2 event pump: {}", e))?;

        Ok(Self { _context: context, title: title.to_owned(), canvas, events })
    }

    pub fn texture_creator(&self) -> TextureCreator<WindowContext> {
        self.canvas.texture_creator()
    }

    /// Drain pending events; true once the user closed the window or hit ESC.
    pub fn close_requested(&mut self) -> bool {
        let mut close = false;
        for event in self.events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown { keycode: Some(Keycode::Escape), .. } => close = true,
                _ => {}
            }
        }
        close
    }

    pub fn present(&mut self, texture: Option<&Texture<'_>>) -> Result<()> {
        self.canvas.clear();
        if let Some(texture) = texture {
            self.canvas.copy(texture, None, None).map_err(|e| anyhow!("texture copy failed: {}", e))?;
        }
        self.canvas.present();
        Ok(())
    }

    pub fn show_error(&self, message: &str) {
        if let Err(e) = show_simple_message_box(MessageBoxFlag::ERROR, &self.title, message, self.canvas.window()) {
            log::error!("could not show error dialog: {e}");
        }
    }
}

/// Copy `bitmap` into `slot`, recreating the texture when its size changes.
///
/// SDL's `RGB888` is XRGB in a native-endian u32, which on little-endian
/// hosts is the same B, G, R, X byte order as `Bgr32`.
pub fn upload<'a>(
    creator: &'a TextureCreator<WindowContext>,
    slot: &mut Option<Texture<'a>>,
    bitmap: &Bitmap,
) -> Result<()> {
    let fits = slot.as_ref().is_some_and(|texture| {
        let query = texture.query();
        query.width == bitmap.width() && query.height == bitmap.height()
    });
    if !fits {
        *slot = Some(creator.create_texture_streaming(
            PixelFormatEnum::RGB888,
            bitmap.width(),
            bitmap.height(),
        )?);
    }
    if let Some(texture) = slot.as_mut() {
        texture.update(None, bitmap.pixels(), bitmap.stride() as usize)?;
    }
    Ok(())
}
