//! Display control module for the watchface.
//!
//! Owns the ST7789 LCD and the mapping from named face regions to screen
//! coordinates. Text regions are cleared and redrawn whole, so a shorter
//! string never leaves stale glyphs behind.

use embassy_nrf::{
    gpio::Output,
    peripherals::{P0_18, P0_22, P0_25, P0_26},
    spim::{self, Spim},
};

use display_interface_spi::SPIInterface;
use embassy_time::Delay;
use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use mipidsi::{models::ST7789, Builder, Orientation};
use profont::PROFONT_24_POINT;

use gotthetime::face::{Region, WatchConfig, WeatherIcon, ALT_ZONE_COUNT};

const LCD_W: u16 = 240;
const LCD_H: u16 = 240;

const BACKGROUND: Rgb565 = Rgb565::BLACK;
const FOREGROUND: Rgb565 = Rgb565::new(0xee, 0xdd, 0xee);

/// Battery fill bar, next to the watch battery percentage.
const BAR_ORIGIN: Point = Point::new(128, 8);
const BAR_SIZE: Size = Size::new(36, 12);

/// Weather icon box, bottom left corner.
const ICON_ORIGIN: Point = Point::new(8, 204);
const ICON_SIZE: Size = Size::new(28, 28);

/// Link-lost indicator, top left corner.
const WARNING_ORIGIN: Point = Point::new(8, 4);
const WARNING_SIZE: Size = Size::new(12, 20);

pub struct Display<SPI>
where
    SPI: spim::Instance,
{
    lcd: mipidsi::Display<
        SPIInterface<Spim<'static, SPI>, Output<'static, P0_18>, Output<'static, P0_25>>,
        ST7789,
        Output<'static, P0_26>,
    >,
    /// Backlight enable pin (active low). Owned here so it stays configured
    /// for the life of the display; a dropped `Output` reverts the pin to a
    /// disconnected input and the backlight goes dark.
    backlight: Output<'static, P0_22>,
}

impl<SPI> Display<SPI>
where
    SPI: spim::Instance,
{
    /// Configure display settings on boot.
    pub fn init(
        spim: Spim<'static, SPI>,
        cs_pin: Output<'static, P0_25>,
        dc_pin: Output<'static, P0_18>,
        rst_pin: Output<'static, P0_26>,
        backlight_pin: Output<'static, P0_22>,
    ) -> Self {
        let lcd = Builder::st7789(SPIInterface::new(spim, dc_pin, cs_pin))
            .with_display_size(LCD_W, LCD_H)
            .with_orientation(Orientation::Portrait(false))
            .init(&mut Delay, Some(rst_pin))
            .unwrap();

        Self {
            lcd,
            backlight: backlight_pin,
        }
    }

    /// Clear the screen and draw the static parts of the face: the separator
    /// under the date block and the alternate timezone labels.
    pub fn draw_chrome(&mut self, config: &WatchConfig) -> Result<(), mipidsi::Error> {
        // Backlight on at the middle level (pin is active low).
        self.backlight.set_low();

        self.lcd.clear(BACKGROUND)?;

        for y in [72, 73] {
            Line::new(Point::new(8, y), Point::new(222, y))
                .into_styled(PrimitiveStyle::with_stroke(FOREGROUND, 1))
                .draw(&mut self.lcd)?;
        }

        let style = MonoTextStyle::new(&FONT_10X20, FOREGROUND);
        for (index, zone) in config.alt_zones.iter().enumerate() {
            let origin = Point::new(8, 156 + 24 * index as i32);
            Text::with_baseline(zone.label, origin, style, Baseline::Top).draw(&mut self.lcd)?;
        }

        Ok(())
    }

    /// Replace the text of a named region.
    pub fn set_text(&mut self, region: Region, text: &str) -> Result<(), mipidsi::Error> {
        let (origin, size) = frame(region);
        Rectangle::new(origin, size)
            .into_styled(PrimitiveStyle::with_fill(BACKGROUND))
            .draw(&mut self.lcd)?;

        let style = match region {
            Region::Time => MonoTextStyle::new(&PROFONT_24_POINT, FOREGROUND),
            _ => MonoTextStyle::new(&FONT_10X20, FOREGROUND),
        };
        Text::with_baseline(text, origin, style, Baseline::Top).draw(&mut self.lcd)?;

        Ok(())
    }

    /// Redraw the battery bar with the given fill percentage.
    pub fn fill_battery_bar(&mut self, percent: u8) -> Result<(), mipidsi::Error> {
        Rectangle::new(BAR_ORIGIN, BAR_SIZE)
            .into_styled(PrimitiveStyle::with_stroke(FOREGROUND, 1))
            .draw(&mut self.lcd)?;

        let interior_origin = BAR_ORIGIN + Point::new(2, 2);
        let interior = Size::new(BAR_SIZE.width - 4, BAR_SIZE.height - 4);
        Rectangle::new(interior_origin, interior)
            .into_styled(PrimitiveStyle::with_fill(BACKGROUND))
            .draw(&mut self.lcd)?;

        let width = interior.width * percent.min(100) as u32 / 100;
        Rectangle::new(interior_origin, Size::new(width, interior.height))
            .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
            .draw(&mut self.lcd)?;

        Ok(())
    }

    /// Swap the weather condition icon.
    pub fn set_weather_icon(&mut self, icon: WeatherIcon) -> Result<(), mipidsi::Error> {
        Rectangle::new(ICON_ORIGIN, ICON_SIZE)
            .into_styled(PrimitiveStyle::with_fill(BACKGROUND))
            .draw(&mut self.lcd)?;

        match icon {
            WeatherIcon::Sun => draw_sun(&mut self.lcd)?,
            WeatherIcon::Cloud => draw_cloud(&mut self.lcd)?,
            WeatherIcon::Rain => {
                draw_cloud(&mut self.lcd)?;
                for x in [14, 20, 26] {
                    Line::new(Point::new(x, 222), Point::new(x - 2, 228))
                        .into_styled(PrimitiveStyle::with_stroke(FOREGROUND, 1))
                        .draw(&mut self.lcd)?;
                }
            }
            WeatherIcon::Snow => {
                draw_cloud(&mut self.lcd)?;
                for x in [13, 19, 25] {
                    Circle::new(Point::new(x, 224), 3)
                        .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
                        .draw(&mut self.lcd)?;
                }
            }
        }

        Ok(())
    }

    /// Show or hide the link-lost indicator.
    pub fn show_link_warning(&mut self, shown: bool) -> Result<(), mipidsi::Error> {
        Rectangle::new(WARNING_ORIGIN, WARNING_SIZE)
            .into_styled(PrimitiveStyle::with_fill(BACKGROUND))
            .draw(&mut self.lcd)?;

        if shown {
            let style = MonoTextStyle::new(&FONT_10X20, FOREGROUND);
            Text::with_baseline("!", WARNING_ORIGIN, style, Baseline::Top).draw(&mut self.lcd)?;
        }

        Ok(())
    }
}

/// Screen frame of a text region.
fn frame(region: Region) -> (Point, Size) {
    match region {
        Region::Weekday => (Point::new(8, 24), Size::new(120, 20)),
        Region::Date => (Point::new(8, 48), Size::new(110, 20)),
        Region::Time => (Point::new(36, 88), Size::new(112, 34)),
        Region::Meridiem => (Point::new(156, 98), Size::new(24, 20)),
        Region::Beats => (Point::new(92, 128), Size::new(56, 20)),
        Region::WatchBattery => (Point::new(170, 6), Size::new(62, 20)),
        Region::PhoneBattery => (Point::new(170, 214), Size::new(62, 20)),
        Region::Temperature => (Point::new(40, 214), Size::new(90, 20)),
        Region::AltZone(index) => {
            let index = (index as usize).min(ALT_ZONE_COUNT - 1) as i32;
            (Point::new(56, 156 + 24 * index), Size::new(56, 20))
        }
    }
}

fn draw_sun<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    Circle::new(ICON_ORIGIN + Point::new(8, 8), 12)
        .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
        .draw(target)?;

    let center = ICON_ORIGIN + Point::new(14, 14);
    for (dx, dy) in [(0, -12), (0, 12), (-12, 0), (12, 0)] {
        let tip = center + Point::new(dx, dy);
        let base = center + Point::new(dx * 2 / 3, dy * 2 / 3);
        Line::new(base, tip)
            .into_styled(PrimitiveStyle::with_stroke(FOREGROUND, 1))
            .draw(target)?;
    }

    Ok(())
}

fn draw_cloud<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    Circle::new(ICON_ORIGIN + Point::new(2, 8), 10)
        .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
        .draw(target)?;
    Circle::new(ICON_ORIGIN + Point::new(9, 4), 14)
        .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
        .draw(target)?;
    Rectangle::new(ICON_ORIGIN + Point::new(4, 12), Size::new(20, 6))
        .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
        .draw(target)?;

    Ok(())
}
