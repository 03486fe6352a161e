//! Mirrored server objects.
//!
//! An [`Entity`] is a tagged union over the object variants the server
//! describes.  Shared state lives in [`ObjectData`]; variants that extend
//! another (player → unit, container → item) embed the base record instead
//! of inheriting from it.
//!
//! Update-field writes arrive as `(index, u32)` pairs.  Every write is kept
//! in [`ObjectData::values`]; the indices listed in [`fields`] are also
//! decoded into typed attributes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::guid::Guid;
use crate::movement::MovementBlock;
use crate::types::Position;

/// Update-field indices (1.12 layout).
pub mod fields {
    pub const OBJECT_FIELD_GUID: u16 = 0x00;
    pub const OBJECT_FIELD_TYPE: u16 = 0x02;
    pub const OBJECT_FIELD_ENTRY: u16 = 0x03;
    pub const OBJECT_FIELD_SCALE_X: u16 = 0x04;
    pub const OBJECT_END: u16 = 0x06;

    pub const ITEM_FIELD_OWNER: u16 = OBJECT_END;
    pub const ITEM_FIELD_CONTAINED: u16 = OBJECT_END + 0x02;
    pub const ITEM_FIELD_STACK_COUNT: u16 = OBJECT_END + 0x08;
    pub const ITEM_FIELD_FLAGS: u16 = OBJECT_END + 0x0F;
    /// 7 slots of (id, duration, charges).
    pub const ITEM_FIELD_ENCHANTMENT: u16 = OBJECT_END + 0x10;
    pub const ITEM_ENCHANT_SLOTS: u16 = 7;
    pub const ITEM_FIELD_DURABILITY: u16 = OBJECT_END + 0x28;
    pub const ITEM_FIELD_MAXDURABILITY: u16 = OBJECT_END + 0x29;
    pub const ITEM_END: u16 = OBJECT_END + 0x2A;

    pub const CONTAINER_FIELD_NUM_SLOTS: u16 = ITEM_END;
    /// 36 slots of (low, high) guid words.
    pub const CONTAINER_FIELD_SLOT_1: u16 = ITEM_END + 0x02;
    pub const CONTAINER_SLOTS: usize = 36;
    pub const CONTAINER_END: u16 = ITEM_END + 0x4A;

    pub const UNIT_FIELD_TARGET: u16 = OBJECT_END + 0x0A;
    pub const UNIT_FIELD_HEALTH: u16 = OBJECT_END + 0x10;
    pub const UNIT_FIELD_POWER1: u16 = OBJECT_END + 0x11;
    pub const UNIT_FIELD_MAXHEALTH: u16 = OBJECT_END + 0x16;
    pub const UNIT_FIELD_MAXPOWER1: u16 = OBJECT_END + 0x17;
    pub const UNIT_FIELD_LEVEL: u16 = OBJECT_END + 0x1C;
    pub const UNIT_FIELD_FACTIONTEMPLATE: u16 = OBJECT_END + 0x1D;
    pub const UNIT_FIELD_FLAGS: u16 = OBJECT_END + 0x28;
    pub const UNIT_FIELD_DISPLAYID: u16 = OBJECT_END + 0x7F;
    pub const UNIT_END: u16 = OBJECT_END + 0xB6;

    /// 23 equipped slots of (low, high) guid words.
    pub const PLAYER_FIELD_INV_SLOT_HEAD: u16 = UNIT_END + 0x12A;
    pub const PLAYER_INVENTORY_SLOTS: usize = 23;
    /// 16 backpack slots of (low, high) guid words.
    pub const PLAYER_FIELD_PACK_SLOT_1: u16 = UNIT_END + 0x158;
    pub const PLAYER_PACK_SLOTS: usize = 16;
    pub const PLAYER_XP: u16 = UNIT_END + 0x210;
    pub const PLAYER_NEXT_LEVEL_XP: u16 = UNIT_END + 0x211;

    pub const GAMEOBJECT_CREATED_BY: u16 = OBJECT_END;
    pub const GAMEOBJECT_DISPLAYID: u16 = OBJECT_END + 0x02;
    pub const GAMEOBJECT_FLAGS: u16 = OBJECT_END + 0x03;
    pub const GAMEOBJECT_STATE: u16 = OBJECT_END + 0x08;
    pub const GAMEOBJECT_POS_X: u16 = OBJECT_END + 0x09;
    pub const GAMEOBJECT_POS_Y: u16 = OBJECT_END + 0x0A;
    pub const GAMEOBJECT_POS_Z: u16 = OBJECT_END + 0x0B;
    pub const GAMEOBJECT_FACING: u16 = OBJECT_END + 0x0C;
    pub const GAMEOBJECT_FACTION: u16 = OBJECT_END + 0x0E;
    pub const GAMEOBJECT_TYPE_ID: u16 = OBJECT_END + 0x0F;
    pub const GAMEOBJECT_LEVEL: u16 = OBJECT_END + 0x10;

    pub const DYNAMICOBJECT_CASTER: u16 = OBJECT_END;
    pub const DYNAMICOBJECT_SPELLID: u16 = OBJECT_END + 0x03;
    pub const DYNAMICOBJECT_RADIUS: u16 = OBJECT_END + 0x04;

    pub const CORPSE_FIELD_OWNER: u16 = OBJECT_END;
    pub const CORPSE_FIELD_DISPLAY_ID: u16 = OBJECT_END + 0x06;
}

use fields::*;

// ---------------------------------------------------------------------------
// Object type
// ---------------------------------------------------------------------------

/// `TYPEID_*` as carried by create blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Object,
    Item,
    Container,
    Unit,
    Player,
    GameObject,
    DynamicObject,
    Corpse,
}

impl ObjectType {
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => Self::Object,
            1 => Self::Item,
            2 => Self::Container,
            3 => Self::Unit,
            4 => Self::Player,
            5 => Self::GameObject,
            6 => Self::DynamicObject,
            7 => Self::Corpse,
            _ => return None,
        })
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Object => 0,
            Self::Item => 1,
            Self::Container => 2,
            Self::Unit => 3,
            Self::Player => 4,
            Self::GameObject => 5,
            Self::DynamicObject => 6,
            Self::Corpse => 7,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared + variant records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectData {
    pub entry: u32,
    pub scale: f32,
    pub position: Option<Position>,
    pub movement_flags: u32,
    pub run_speed: Option<f32>,
    /// Every update-field value received, by index.
    pub values: BTreeMap<u16, u32>,
}

impl Default for ObjectData {
    fn default() -> Self {
        Self {
            entry: 0,
            scale: 1.0,
            position: None,
            movement_flags: 0,
            run_speed: None,
            values: BTreeMap::new(),
        }
    }
}

/// A spell the unit is currently casting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCast {
    pub spell_id: u32,
    pub cast_time_ms: u32,
    pub started_at: Instant,
}

impl ActiveCast {
    /// The instant after which this cast is considered stuck.
    pub fn deadline(&self, grace: Duration, instant_timeout: Duration) -> Instant {
        if self.cast_time_ms == 0 {
            self.started_at + instant_timeout
        } else {
            self.started_at + Duration::from_millis(u64::from(self.cast_time_ms)) + grace
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitData {
    pub health: u32,
    pub max_health: u32,
    pub power: u32,
    pub max_power: u32,
    pub level: u32,
    pub faction_template: u32,
    pub flags: u32,
    pub display_id: u32,
    pub target: Guid,
    pub active_cast: Option<ActiveCast>,
    pub auto_attacking: bool,
}

impl UnitData {
    fn apply_value(&mut self, index: u16, value: u32) {
        match index {
            UNIT_FIELD_TARGET => self.target = self.target.with_low(value),
            i if i == UNIT_FIELD_TARGET + 1 => self.target = self.target.with_high(value),
            UNIT_FIELD_HEALTH => self.health = value,
            UNIT_FIELD_POWER1 => self.power = value,
            UNIT_FIELD_MAXHEALTH => self.max_health = value,
            UNIT_FIELD_MAXPOWER1 => self.max_power = value,
            UNIT_FIELD_LEVEL => self.level = value,
            UNIT_FIELD_FACTIONTEMPLATE => self.faction_template = value,
            UNIT_FIELD_FLAGS => self.flags = value,
            UNIT_FIELD_DISPLAYID => self.display_id = value,
            _ => {}
        }
    }

    pub fn is_casting(&self) -> bool {
        self.active_cast.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerData {
    pub unit: UnitData,
    pub xp: u32,
    pub next_level_xp: u32,
    pub inventory: [Guid; PLAYER_INVENTORY_SLOTS],
    pub backpack: [Guid; PLAYER_PACK_SLOTS],
}

impl Default for PlayerData {
    fn default() -> Self {
        Self {
            unit: UnitData::default(),
            xp: 0,
            next_level_xp: 0,
            inventory: [Guid::EMPTY; PLAYER_INVENTORY_SLOTS],
            backpack: [Guid::EMPTY; PLAYER_PACK_SLOTS],
        }
    }
}

impl PlayerData {
    fn apply_value(&mut self, index: u16, value: u32) {
        if index < UNIT_END {
            self.unit.apply_value(index, value);
            return;
        }
        match index {
            PLAYER_XP => self.xp = value,
            PLAYER_NEXT_LEVEL_XP => self.next_level_xp = value,
            _ => {
                if !set_guid_word(&mut self.inventory, PLAYER_FIELD_INV_SLOT_HEAD, index, value) {
                    set_guid_word(&mut self.backpack, PLAYER_FIELD_PACK_SLOT_1, index, value);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemData {
    pub owner: Guid,
    pub contained: Guid,
    pub stack_count: u32,
    pub flags: u32,
    pub enchantments: [u32; ITEM_ENCHANT_SLOTS as usize],
    pub durability: u32,
    pub max_durability: u32,
}

impl ItemData {
    fn apply_value(&mut self, index: u16, value: u32) {
        match index {
            ITEM_FIELD_OWNER => self.owner = self.owner.with_low(value),
            i if i == ITEM_FIELD_OWNER + 1 => self.owner = self.owner.with_high(value),
            ITEM_FIELD_CONTAINED => self.contained = self.contained.with_low(value),
            i if i == ITEM_FIELD_CONTAINED + 1 => {
                self.contained = self.contained.with_high(value)
            }
            ITEM_FIELD_STACK_COUNT => self.stack_count = value,
            ITEM_FIELD_FLAGS => self.flags = value,
            ITEM_FIELD_DURABILITY => self.durability = value,
            ITEM_FIELD_MAXDURABILITY => self.max_durability = value,
            i if (ITEM_FIELD_ENCHANTMENT..ITEM_FIELD_ENCHANTMENT + ITEM_ENCHANT_SLOTS * 3)
                .contains(&i) =>
            {
                let rel = i - ITEM_FIELD_ENCHANTMENT;
                // only the id word of each (id, duration, charges) triple
                if rel % 3 == 0 {
                    self.enchantments[(rel / 3) as usize] = value;
                }
            }
            _ => {}
        }
    }

    pub fn is_enchanted(&self) -> bool {
        self.enchantments.iter().any(|&id| id != 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerData {
    pub item: ItemData,
    pub num_slots: u32,
    pub slots: [Guid; CONTAINER_SLOTS],
}

impl Default for ContainerData {
    fn default() -> Self {
        Self {
            item: ItemData::default(),
            num_slots: 0,
            slots: [Guid::EMPTY; CONTAINER_SLOTS],
        }
    }
}

impl ContainerData {
    fn apply_value(&mut self, index: u16, value: u32) {
        if index < ITEM_END {
            self.item.apply_value(index, value);
        } else if index == CONTAINER_FIELD_NUM_SLOTS {
            self.num_slots = value;
        } else {
            set_guid_word(&mut self.slots, CONTAINER_FIELD_SLOT_1, index, value);
        }
    }

    /// Occupied slots, limited to the container's declared size.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, Guid)> + '_ {
        let limit = (self.num_slots as usize).min(CONTAINER_SLOTS);
        self.slots[..limit]
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, g)| !g.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameObjectData {
    pub created_by: Guid,
    pub display_id: u32,
    pub flags: u32,
    pub state: u32,
    pub go_type: u32,
    pub faction: u32,
    pub level: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub facing: f32,
}

impl GameObjectData {
    fn apply_value(&mut self, index: u16, value: u32) {
        match index {
            GAMEOBJECT_CREATED_BY => self.created_by = self.created_by.with_low(value),
            i if i == GAMEOBJECT_CREATED_BY + 1 => {
                self.created_by = self.created_by.with_high(value)
            }
            GAMEOBJECT_DISPLAYID => self.display_id = value,
            GAMEOBJECT_FLAGS => self.flags = value,
            GAMEOBJECT_STATE => self.state = value,
            GAMEOBJECT_POS_X => self.x = f32::from_bits(value),
            GAMEOBJECT_POS_Y => self.y = f32::from_bits(value),
            GAMEOBJECT_POS_Z => self.z = f32::from_bits(value),
            GAMEOBJECT_FACING => self.facing = f32::from_bits(value),
            GAMEOBJECT_FACTION => self.faction = value,
            GAMEOBJECT_TYPE_ID => self.go_type = value,
            GAMEOBJECT_LEVEL => self.level = value,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicObjectData {
    pub caster: Guid,
    pub spell_id: u32,
    pub radius: f32,
}

impl DynamicObjectData {
    fn apply_value(&mut self, index: u16, value: u32) {
        match index {
            DYNAMICOBJECT_CASTER => self.caster = self.caster.with_low(value),
            i if i == DYNAMICOBJECT_CASTER + 1 => self.caster = self.caster.with_high(value),
            DYNAMICOBJECT_SPELLID => self.spell_id = value,
            DYNAMICOBJECT_RADIUS => self.radius = f32::from_bits(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpseData {
    pub owner: Guid,
    pub display_id: u32,
}

impl CorpseData {
    fn apply_value(&mut self, index: u16, value: u32) {
        match index {
            CORPSE_FIELD_OWNER => self.owner = self.owner.with_low(value),
            i if i == CORPSE_FIELD_OWNER + 1 => self.owner = self.owner.with_high(value),
            CORPSE_FIELD_DISPLAY_ID => self.display_id = value,
            _ => {}
        }
    }
}

/// Write one word of a (low, high) guid pair inside a slot array.
/// Returns false when `index` falls outside the array.
fn set_guid_word(slots: &mut [Guid], base: u16, index: u16, value: u32) -> bool {
    let Some(rel) = index.checked_sub(base) else {
        return false;
    };
    let slot = usize::from(rel / 2);
    let Some(guid) = slots.get_mut(slot) else {
        return false;
    };
    *guid = if rel % 2 == 0 {
        guid.with_low(value)
    } else {
        guid.with_high(value)
    };
    true
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Unit(UnitData),
    Player(PlayerData),
    GameObject(GameObjectData),
    Container(ContainerData),
    Item(ItemData),
    Corpse(CorpseData),
    DynamicObject(DynamicObjectData),
    None,
}

impl EntityKind {
    pub fn for_type(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Object => Self::None,
            ObjectType::Item => Self::Item(ItemData::default()),
            ObjectType::Container => Self::Container(ContainerData::default()),
            ObjectType::Unit => Self::Unit(UnitData::default()),
            ObjectType::Player => Self::Player(PlayerData::default()),
            ObjectType::GameObject => Self::GameObject(GameObjectData::default()),
            ObjectType::DynamicObject => Self::DynamicObject(DynamicObjectData::default()),
            ObjectType::Corpse => Self::Corpse(CorpseData::default()),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Unit(_) => ObjectType::Unit,
            Self::Player(_) => ObjectType::Player,
            Self::GameObject(_) => ObjectType::GameObject,
            Self::Container(_) => ObjectType::Container,
            Self::Item(_) => ObjectType::Item,
            Self::Corpse(_) => ObjectType::Corpse,
            Self::DynamicObject(_) => ObjectType::DynamicObject,
            Self::None => ObjectType::Object,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub guid: Guid,
    pub object: ObjectData,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(guid: Guid, object_type: ObjectType) -> Self {
        Self {
            guid,
            object: ObjectData::default(),
            kind: EntityKind::for_type(object_type),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    /// Unit attributes for units and players.
    pub fn unit(&self) -> Option<&UnitData> {
        match &self.kind {
            EntityKind::Unit(u) => Some(u),
            EntityKind::Player(p) => Some(&p.unit),
            _ => None,
        }
    }

    pub fn unit_mut(&mut self) -> Option<&mut UnitData> {
        match &mut self.kind {
            EntityKind::Unit(u) => Some(u),
            EntityKind::Player(p) => Some(&mut p.unit),
            _ => None,
        }
    }

    /// Item attributes for items and containers.
    pub fn item(&self) -> Option<&ItemData> {
        match &self.kind {
            EntityKind::Item(i) => Some(i),
            EntityKind::Container(c) => Some(&c.item),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match &self.kind {
            EntityKind::GameObject(go) if self.object.position.is_none() => {
                Some(Position::new(go.x, go.y, go.z, go.facing))
            }
            _ => self.object.position,
        }
    }

    /// Apply one update-field write.
    pub fn apply_value(&mut self, index: u16, value: u32) {
        self.object.values.insert(index, value);
        match index {
            OBJECT_FIELD_ENTRY => self.object.entry = value,
            OBJECT_FIELD_SCALE_X => self.object.scale = f32::from_bits(value),
            i if i < OBJECT_END => {}
            _ => match &mut self.kind {
                EntityKind::Unit(u) => u.apply_value(index, value),
                EntityKind::Player(p) => p.apply_value(index, value),
                EntityKind::GameObject(g) => g.apply_value(index, value),
                EntityKind::Container(c) => c.apply_value(index, value),
                EntityKind::Item(i) => i.apply_value(index, value),
                EntityKind::Corpse(c) => c.apply_value(index, value),
                EntityKind::DynamicObject(d) => d.apply_value(index, value),
                EntityKind::None => {}
            },
        }
    }

    pub fn apply_movement(&mut self, movement: &MovementBlock) {
        if let Some(living) = &movement.living {
            self.object.position = Some(living.position);
            self.object.movement_flags = living.flags;
            self.object.run_speed = Some(living.speeds.run);
        } else if let Some(position) = movement.position {
            self.object.position = Some(position);
        }
    }

    /// Raw value of an update field, if it has been received.
    pub fn value(&self, index: u16) -> Option<u32> {
        self.object.values.get(&index).copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_fields_route_to_typed_attributes() {
        let mut e = Entity::new(Guid::new(0xF130_0000_0000_0001), ObjectType::Unit);
        e.apply_value(OBJECT_FIELD_ENTRY, 299);
        e.apply_value(UNIT_FIELD_HEALTH, 80);
        e.apply_value(UNIT_FIELD_MAXHEALTH, 100);
        e.apply_value(UNIT_FIELD_LEVEL, 5);
        e.apply_value(UNIT_FIELD_TARGET, 0x42);
        e.apply_value(UNIT_FIELD_TARGET + 1, 0x1);

        let unit = e.unit().unwrap();
        assert_eq!(e.object.entry, 299);
        assert_eq!(unit.health, 80);
        assert_eq!(unit.max_health, 100);
        assert_eq!(unit.level, 5);
        assert_eq!(unit.target.raw(), 0x0000_0001_0000_0042);
        assert_eq!(e.value(UNIT_FIELD_HEALTH), Some(80));
    }

    #[test]
    fn player_embeds_unit() {
        let mut e = Entity::new(Guid::new(7), ObjectType::Player);
        e.apply_value(UNIT_FIELD_HEALTH, 55);
        e.apply_value(PLAYER_XP, 1200);
        e.apply_value(PLAYER_FIELD_PACK_SLOT_1 + 2, 0x99);
        e.apply_value(PLAYER_FIELD_PACK_SLOT_1 + 3, 0x4000_0000);

        let EntityKind::Player(p) = &e.kind else {
            panic!("expected player");
        };
        assert_eq!(p.unit.health, 55);
        assert_eq!(p.xp, 1200);
        assert_eq!(p.backpack[1].raw(), 0x4000_0000_0000_0099);
        assert!(e.unit().is_some());
    }

    #[test]
    fn container_slots_are_guid_pairs() {
        let mut e = Entity::new(Guid::new(0x4000_0000_0000_0010), ObjectType::Container);
        e.apply_value(CONTAINER_FIELD_NUM_SLOTS, 4);
        e.apply_value(CONTAINER_FIELD_SLOT_1 + 4, 0x77);
        e.apply_value(CONTAINER_FIELD_SLOT_1 + 5, 0x4000_0000);
        e.apply_value(ITEM_FIELD_STACK_COUNT, 1);

        let EntityKind::Container(c) = &e.kind else {
            panic!("expected container");
        };
        let occupied: Vec<_> = c.occupied().collect();
        assert_eq!(occupied, vec![(2, Guid::new(0x4000_0000_0000_0077))]);
        assert_eq!(c.item.stack_count, 1);
    }

    #[test]
    fn slot_beyond_last_container_slot_is_ignored() {
        let mut e = Entity::new(Guid::new(1), ObjectType::Container);
        e.apply_value(CONTAINER_END, 5);
        let EntityKind::Container(c) = &e.kind else {
            panic!("expected container");
        };
        assert!(c.slots.iter().all(|g| g.is_empty()));
        assert_eq!(e.value(CONTAINER_END), Some(5));
    }

    #[test]
    fn item_enchant_ids_only() {
        let mut e = Entity::new(Guid::new(1), ObjectType::Item);
        e.apply_value(ITEM_FIELD_ENCHANTMENT, 1900);
        e.apply_value(ITEM_FIELD_ENCHANTMENT + 1, 3600);
        e.apply_value(ITEM_FIELD_ENCHANTMENT + 3, 42);
        let item = e.item().unwrap();
        assert_eq!(item.enchantments[0], 1900);
        assert_eq!(item.enchantments[1], 42);
        assert!(item.is_enchanted());
    }

    #[test]
    fn gameobject_position_from_fields() {
        let mut e = Entity::new(Guid::new(0xF110_0000_0000_0001), ObjectType::GameObject);
        e.apply_value(GAMEOBJECT_POS_X, 10.5f32.to_bits());
        e.apply_value(GAMEOBJECT_POS_Y, (-3.0f32).to_bits());
        let pos = e.position().unwrap();
        assert_eq!(pos.x, 10.5);
        assert_eq!(pos.y, -3.0);
    }

    #[test]
    fn cast_deadline_uses_instant_timeout_for_zero_cast_time() {
        let now = Instant::now();
        let cast = ActiveCast {
            spell_id: 1,
            cast_time_ms: 0,
            started_at: now,
        };
        let deadline = cast.deadline(Duration::from_secs(2), Duration::from_secs(10));
        assert_eq!(deadline, now + Duration::from_secs(10));

        let timed = ActiveCast {
            cast_time_ms: 1500,
            ..cast
        };
        assert_eq!(
            timed.deadline(Duration::from_secs(2), Duration::from_secs(10)),
            now + Duration::from_millis(3500)
        );
    }
}
