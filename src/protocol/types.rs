//! # Packet Type Table
//!
//! Closed enumeration of the protocol's numeric packet-type ids. Roughly a
//! third of these have a registered structured decoder in
//! [`crate::protocol::records`]; the rest are forwarded opaquely.

/// All packet-type ids the protocol defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    ProtocolRequest = 0,
    ProtocolResponse = 1,
    ServerDisconnect = 2,
    ConnectSuccess = 3,
    ConnectFailure = 4,
    HandshakeChallenge = 5,
    ChatReceived = 6,
    UniverseTimeUpdate = 7,
    CelestialResponse = 8,
    ClientConnect = 9,
    ClientDisconnectRequest = 10,
    HandshakeResponse = 11,
    PlayerWarp = 12,
    FlyShip = 13,
    ChatSent = 14,
    CelestialRequest = 15,
    ClientContextUpdate = 16,
    WorldStart = 17,
    WorldStop = 18,
    CentralStructureUpdate = 19,
    TileArrayUpdate = 20,
    TileUpdate = 21,
    TileLiquidUpdate = 22,
    TileDamageUpdate = 23,
    TileModificationFailure = 24,
    GiveItem = 25,
    EnvironmentUpdate = 26,
    UpdateTileProtection = 27,
    SetDungeonGravity = 28,
    SetDungeonBreathable = 29,
    SetPlayerStart = 30,
    FindUniqueEntityResponse = 31,
    ModifyTileList = 32,
    DamageTileGroup = 33,
    CollectLiquid = 34,
    RequestDrop = 35,
    SpawnEntity = 36,
    ConnectWire = 37,
    DisconnectAllWires = 38,
    WorldClientStateUpdate = 39,
    FindUniqueEntity = 40,
    WorldStartAcknowledge = 41,
    Heartbeat = 42,
    EntityCreate = 43,
    EntityUpdate = 44,
    EntityDestroy = 45,
    EntityInteract = 46,
    EntityInteractResult = 47,
    HitRequest = 48,
    DamageRequest = 49,
    DamageNotification = 50,
    EntityMessage = 51,
    EntityMessageResponse = 52,
    UpdateWorldProperties = 53,
    StepUpdate = 54,
    SystemWorldStart = 55,
    SystemWorldUpdate = 56,
    SystemObjectCreate = 57,
    SystemObjectDestroy = 58,
    SystemShipCreate = 59,
    SystemShipDestroy = 60,
    SystemObjectSpawn = 61,
}

impl PacketType {
    /// Map a wire id back to the enumeration. Ids past the table are not
    /// part of the protocol.
    pub fn from_id(id: u8) -> Option<PacketType> {
        use PacketType::*;
        Some(match id {
            0 => ProtocolRequest,
            1 => ProtocolResponse,
            2 => ServerDisconnect,
            3 => ConnectSuccess,
            4 => ConnectFailure,
            5 => HandshakeChallenge,
            6 => ChatReceived,
            7 => UniverseTimeUpdate,
            8 => CelestialResponse,
            9 => ClientConnect,
            10 => ClientDisconnectRequest,
            11 => HandshakeResponse,
            12 => PlayerWarp,
            13 => FlyShip,
            14 => ChatSent,
            15 => CelestialRequest,
            16 => ClientContextUpdate,
            17 => WorldStart,
            18 => WorldStop,
            19 => CentralStructureUpdate,
            20 => TileArrayUpdate,
            21 => TileUpdate,
            22 => TileLiquidUpdate,
            23 => TileDamageUpdate,
            24 => TileModificationFailure,
            25 => GiveItem,
            26 => EnvironmentUpdate,
            27 => UpdateTileProtection,
            28 => SetDungeonGravity,
            29 => SetDungeonBreathable,
            30 => SetPlayerStart,
            31 => FindUniqueEntityResponse,
            32 => ModifyTileList,
            33 => DamageTileGroup,
            34 => CollectLiquid,
            35 => RequestDrop,
            36 => SpawnEntity,
            37 => ConnectWire,
            38 => DisconnectAllWires,
            39 => WorldClientStateUpdate,
            40 => FindUniqueEntity,
            41 => WorldStartAcknowledge,
            42 => Heartbeat,
            43 => EntityCreate,
            44 => EntityUpdate,
            45 => EntityDestroy,
            46 => EntityInteract,
            47 => EntityInteractResult,
            48 => HitRequest,
            49 => DamageRequest,
            50 => DamageNotification,
            51 => EntityMessage,
            52 => EntityMessageResponse,
            53 => UpdateWorldProperties,
            54 => StepUpdate,
            55 => SystemWorldStart,
            56 => SystemWorldUpdate,
            57 => SystemObjectCreate,
            58 => SystemObjectDestroy,
            59 => SystemShipCreate,
            60 => SystemShipDestroy,
            61 => SystemObjectSpawn,
            _ => return None,
        })
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Stable name used for gate dispatch and logging.
    pub fn name(self) -> &'static str {
        use PacketType::*;
        match self {
            ProtocolRequest => "protocol_request",
            ProtocolResponse => "protocol_response",
            ServerDisconnect => "server_disconnect",
            ConnectSuccess => "connect_success",
            ConnectFailure => "connect_failure",
            HandshakeChallenge => "handshake_challenge",
            ChatReceived => "chat_received",
            UniverseTimeUpdate => "universe_time_update",
            CelestialResponse => "celestial_response",
            ClientConnect => "client_connect",
            ClientDisconnectRequest => "client_disconnect_request",
            HandshakeResponse => "handshake_response",
            PlayerWarp => "player_warp",
            FlyShip => "fly_ship",
            ChatSent => "chat_sent",
            CelestialRequest => "celestial_request",
            ClientContextUpdate => "client_context_update",
            WorldStart => "world_start",
            WorldStop => "world_stop",
            CentralStructureUpdate => "central_structure_update",
            TileArrayUpdate => "tile_array_update",
            TileUpdate => "tile_update",
            TileLiquidUpdate => "tile_liquid_update",
            TileDamageUpdate => "tile_damage_update",
            TileModificationFailure => "tile_modification_failure",
            GiveItem => "give_item",
            EnvironmentUpdate => "environment_update",
            UpdateTileProtection => "update_tile_protection",
            SetDungeonGravity => "set_dungeon_gravity",
            SetDungeonBreathable => "set_dungeon_breathable",
            SetPlayerStart => "set_player_start",
            FindUniqueEntityResponse => "find_unique_entity_response",
            ModifyTileList => "modify_tile_list",
            DamageTileGroup => "damage_tile_group",
            CollectLiquid => "collect_liquid",
            RequestDrop => "request_drop",
            SpawnEntity => "spawn_entity",
            ConnectWire => "connect_wire",
            DisconnectAllWires => "disconnect_all_wires",
            WorldClientStateUpdate => "world_client_state_update",
            FindUniqueEntity => "find_unique_entity",
            WorldStartAcknowledge => "world_start_acknowledge",
            Heartbeat => "heartbeat",
            EntityCreate => "entity_create",
            EntityUpdate => "entity_update",
            EntityDestroy => "entity_destroy",
            EntityInteract => "entity_interact",
            EntityInteractResult => "entity_interact_result",
            HitRequest => "hit_request",
            DamageRequest => "damage_request",
            DamageNotification => "damage_notification",
            EntityMessage => "entity_message",
            EntityMessageResponse => "entity_message_response",
            UpdateWorldProperties => "update_world_properties",
            StepUpdate => "step_update",
            SystemWorldStart => "system_world_start",
            SystemWorldUpdate => "system_world_update",
            SystemObjectCreate => "system_object_create",
            SystemObjectDestroy => "system_object_destroy",
            SystemShipCreate => "system_ship_create",
            SystemShipDestroy => "system_ship_destroy",
            SystemObjectSpawn => "system_object_spawn",
        }
    }
}
