//! Movement data carried by update-object create and movement blocks.

use serde::{Deserialize, Serialize};

use crate::guid::Guid;
use crate::types::Position;

/// `UPDATEFLAG_*` bits of a movement block header.
pub mod update_flags {
    pub const SELF: u8 = 0x01;
    pub const TRANSPORT: u8 = 0x02;
    pub const MELEE_ATTACKING: u8 = 0x04;
    pub const HIGHGUID: u8 = 0x08;
    pub const ALL: u8 = 0x10;
    pub const LIVING: u8 = 0x20;
    pub const HAS_POSITION: u8 = 0x40;
}

/// `MOVEFLAG_*` bits that gate optional movement fields.
pub mod move_flags {
    pub const JUMPING: u32 = 0x0000_2000;
    pub const SWIMMING: u32 = 0x0020_0000;
    pub const SPLINE_ENABLED: u32 = 0x0040_0000;
    pub const ONTRANSPORT: u32 = 0x0200_0000;
    pub const SPLINE_ELEVATION: u32 = 0x0400_0000;
}

/// `SPLINEFLAG_*` bits selecting the spline's final facing.
pub mod spline_flags {
    pub const FINAL_POINT: u32 = 0x0001_0000;
    pub const FINAL_TARGET: u32 = 0x0002_0000;
    pub const FINAL_ANGLE: u32 = 0x0004_0000;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportInfo {
    pub guid: Guid,
    pub offset: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpInfo {
    pub velocity: f32,
    pub sin_angle: f32,
    pub cos_angle: f32,
    pub xy_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementSpeeds {
    pub walk: f32,
    pub run: f32,
    pub run_back: f32,
    pub swim: f32,
    pub swim_back: f32,
    pub turn_rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplineFacing {
    None,
    Point { x: f32, y: f32, z: f32 },
    Target(Guid),
    Angle(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplinePath {
    pub flags: u32,
    pub facing: SplineFacing,
    pub time_passed: u32,
    pub duration: u32,
    pub id: u32,
    pub nodes: Vec<[f32; 3]>,
    pub destination: [f32; 3],
}

/// Movement state of a living object (units and players).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivingMovement {
    pub flags: u32,
    pub time: u32,
    pub position: Position,
    pub transport: Option<TransportInfo>,
    pub pitch: Option<f32>,
    pub fall_time: u32,
    pub jump: Option<JumpInfo>,
    pub spline_elevation: Option<f32>,
    pub speeds: MovementSpeeds,
    pub spline: Option<SplinePath>,
}

/// The movement section of a create or movement update block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementBlock {
    pub update_flags: u8,
    pub living: Option<LivingMovement>,
    /// Stationary position, present when the object is not living.
    pub position: Option<Position>,
    pub high_guid: Option<u32>,
    pub all: Option<u32>,
    pub attacking: Option<Guid>,
    pub transport_time: Option<u32>,
}

impl MovementBlock {
    /// Marks the block describing the locally controlled player.
    pub fn is_self(&self) -> bool {
        self.update_flags & update_flags::SELF != 0
    }

    pub fn position(&self) -> Option<Position> {
        self.living
            .as_ref()
            .map(|l| l.position)
            .or(self.position)
    }
}
