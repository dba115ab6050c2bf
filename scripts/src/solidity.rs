//! Definitions of Solidity functions called during deployment and upgrades

use alloy::sol;

sol! {
    /// The OpenZeppelin `UpgradeableBeacon`
    #[sol(rpc)]
    interface IUpgradeableBeacon {
        function implementation() external view returns (address);
        function owner() external view returns (address);
        function upgradeTo(address newImplementation) external;
    }
}

sol! {
    /// The version probe every managed contract exposes
    #[sol(rpc)]
    interface IVersioned {
        function VERSION() external view returns (string memory);
    }
}

sol! {
    /// The TEEVerifier initializer and post-deploy probes
    #[sol(rpc)]
    interface ITEEVerifier {
        struct TrustedMeasurements {
            bytes mrtd;
            bytes rtmr0;
            bytes rtmr1;
            bytes rtmr2;
            bytes rtmr3;
        }

        function initialize(bytes memory tdxQuote, TrustedMeasurements memory measurements) external;
        function verified() external view returns (bool);
        function teeAddress() external view returns (address);
    }
}

sol! {
    /// The Verifier initializer
    interface IVerifier {
        struct AttestationConfig {
            uint8 oracleType;
            address contractAddress;
        }

        function initialize(AttestationConfig[] memory configs, address admin) external;
    }
}

sol! {
    /// The AgentNFT initializer and mint entry point
    #[sol(rpc)]
    interface IAgentNFT {
        struct IntelligentData {
            string dataDescription;
            bytes32 dataHash;
        }

        function initialize(
            string memory name,
            string memory symbol,
            string memory storageInfo,
            address verifier,
            address admin
        ) external;

        function mint(IntelligentData[] memory datas, address to) external payable returns (uint256);
    }
}

sol! {
    /// The AgentMarket initializer
    interface IAgentMarket {
        function initialize(
            address agentNFT,
            uint256 feeRate,
            address admin,
            uint256 mintFee,
            uint256 discountMintFee
        ) external;
    }
}
