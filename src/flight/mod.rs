//! Flight state machine. Each mode is an independent flag with its own edge
//! detector; [`FlightModes`] groups them so the loop driver can thread one
//! value through an iteration.

pub mod althold;
pub mod arming;
pub mod checkbox;
pub mod edge;
pub mod failsafe;
pub mod navigation;
pub mod stick_command;
pub mod uncrashable;

pub use althold::AltitudeHold;
pub use arming::{ArmingEvent, ArmingState};
pub use checkbox::{aux_positions, AuxSwitchMask, Checkbox, CheckboxConfig, CheckboxItems, CHECKBOX_COUNT};
pub use edge::{Edge, EdgeDetector};
pub use failsafe::Failsafe;
pub use navigation::{NavigationMode, Navigator, Position};
pub use stick_command::StickCommand;
pub use uncrashable::{AltitudeGuard, Uncrashable};

use crate::receiver::RxChannels;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightModes {
    /// Checkboxes active this iteration.
    pub items: CheckboxItems,
    pub arming: ArmingState,
    pub failsafe: Failsafe,
    pub altitude_hold: AltitudeHold,
    pub uncrashable: Uncrashable,
    pub stick_command: StickCommand,
    pub navigator: Navigator,
}

impl FlightModes {
    pub const fn new(now: u32) -> Self {
        Self {
            items: CheckboxItems::empty(),
            arming: ArmingState::new(),
            failsafe: Failsafe::new(now),
            altitude_hold: AltitudeHold::new(),
            uncrashable: Uncrashable::new(),
            stick_command: StickCommand::new(),
            navigator: Navigator::new(),
        }
    }

    /// Re-evaluates the checkboxes from the aux channels.
    pub fn refresh_items(&mut self, config: &CheckboxConfig, rx: &RxChannels) -> CheckboxItems {
        let items = config.active_items(aux_positions(rx));
        if items != self.items {
            debug!("checkboxes {=u16:#x}", items.bits());
        }
        self.items = items;
        items
    }

    pub fn is_armed(&self) -> bool {
        self.arming.is_armed()
    }

    pub fn is_active(&self, item: CheckboxItems) -> bool {
        self.items.contains(item)
    }
}
