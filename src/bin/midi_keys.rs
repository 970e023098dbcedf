// DEFMT_LOG=info cargo rrb midi_keys

#![no_std]
#![no_main]

use f103_midikeys as _; // global logger + panicking-behavior

#[rtic::app(device = stm32f1xx_hal::pac, peripherals = true)]
mod app {
    use f103_midikeys::config::WATCHDOG_TIMEOUT_MS;
    use f103_midikeys::usb::UsbDeviceEngine;
    use f103_midikeys::{Indicator, Indicators, KeyPort, MidiKeyboard, Watchdog};
    use stm32f1xx_hal::gpio::{ErasedPin, Input, Output, PinState, PullUp, PushPull};
    use stm32f1xx_hal::prelude::*;
    use stm32f1xx_hal::usb::{Peripheral, UsbBus, UsbBusType};
    use stm32f1xx_hal::watchdog::IndependentWatchdog;
    use usb_device::bus::UsbBusAllocator;

    /// PA0..PA5, pulled up, a held key reads low.
    pub struct PortKeys([ErasedPin<Input<PullUp>>; 6]);

    impl KeyPort for PortKeys {
        fn read(&mut self) -> u8 {
            self.0
                .iter()
                .enumerate()
                .fold(0xff, |levels, (bit, pin)| {
                    if pin.is_low() {
                        levels & !(1 << bit)
                    } else {
                        levels
                    }
                })
        }
    }

    /// PB10..PB14, LEDs wired to VCC.
    pub struct PortIndicators([ErasedPin<Output<PushPull>>; Indicator::COUNT]);

    impl Indicators for PortIndicators {
        fn toggle(&mut self, indicator: Indicator) {
            self.0[indicator.index()].toggle();
        }
    }

    pub struct Iwdg(IndependentWatchdog);

    impl Watchdog for Iwdg {
        fn feed(&mut self) {
            self.0.feed();
        }
    }

    type Keyboard =
        MidiKeyboard<UsbDeviceEngine<'static, UsbBusType>, PortKeys, Iwdg, PortIndicators>;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        keyboard: Keyboard,
    }

    #[init(local = [bus: Option<UsbBusAllocator<UsbBusType>> = None])]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::info!("init");

        let p = cx.device;

        let rcc = p.RCC.constrain();
        let mut flash = p.FLASH.constrain();

        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(48.MHz())
            .pclk1(24.MHz())
            .freeze(&mut flash.acr);

        assert!(clocks.usbclk_valid(), "usb clocks not valid");

        let mut gpioa = p.GPIOA.split();
        let mut gpiob = p.GPIOB.split();

        let keys = PortKeys([
            gpioa.pa0.into_pull_up_input(&mut gpioa.crl).erase(),
            gpioa.pa1.into_pull_up_input(&mut gpioa.crl).erase(),
            gpioa.pa2.into_pull_up_input(&mut gpioa.crl).erase(),
            gpioa.pa3.into_pull_up_input(&mut gpioa.crl).erase(),
            gpioa.pa4.into_pull_up_input(&mut gpioa.crl).erase(),
            gpioa.pa5.into_pull_up_input(&mut gpioa.crl).erase(),
        ]);

        // all LEDs off
        let leds = PortIndicators([
            gpiob.pb10.into_push_pull_output_with_state(&mut gpiob.crh, PinState::High).erase(),
            gpiob.pb11.into_push_pull_output_with_state(&mut gpiob.crh, PinState::High).erase(),
            gpiob.pb12.into_push_pull_output_with_state(&mut gpiob.crh, PinState::High).erase(),
            gpiob.pb13.into_push_pull_output_with_state(&mut gpiob.crh, PinState::High).erase(),
            gpiob.pb14.into_push_pull_output_with_state(&mut gpiob.crh, PinState::High).erase(),
        ]);

        // BluePill board has a pull-up resistor on the D+ line.
        // Pull the D+ pin down to send a RESET condition to the USB bus.
        // This forced reset is needed only for development, without it host
        // will not reset your device when you upload new firmware.
        let mut usb_dp = gpioa.pa12.into_push_pull_output(&mut gpioa.crh);
        usb_dp.set_low();
        cortex_m::asm::delay(clocks.sysclk().raw() / 100);

        let usb = Peripheral {
            usb: p.USB,
            pin_dm: gpioa.pa11,
            pin_dp: usb_dp.into_floating_input(&mut gpioa.crh),
        };

        *cx.local.bus = Some(UsbBus::new(usb));
        let usb_bus = cx.local.bus.as_ref().expect("usb bus just stored");
        let engine =
            UsbDeviceEngine::new(usb_bus).expect("MIDI endpoints 0x01/0x81 unavailable");

        let mut watchdog = IndependentWatchdog::new(p.IWDG);
        watchdog.start(WATCHDOG_TIMEOUT_MS.millis());

        let keyboard = MidiKeyboard::new(engine, keys, Iwdg(watchdog), leds);

        (Shared {}, Local { keyboard }, init::Monotonics())
    }

    #[idle(local = [keyboard])]
    fn idle(cx: idle::Context) -> ! {
        cx.local.keyboard.run()
    }
}
